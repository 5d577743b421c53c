//! Command registry and dispatch.
//!
//! Commands are descriptors ([`CommandSpec`]) paired with a boxed
//! [`Handler`]. Dispatch strips the channel prefix, resolves the command by
//! name or alias, gates it through the permission resolver and runs it.

use super::blacklist::{BlacklistHandler, GlobalBlacklistHandler};
use super::context::{ChatMessage, Context, Handler, Reply};
use super::misc::{BroadcastHandler, HelpHandler, PartHandler, PingHandler, PrivilegeHandler};
use super::queue::{
    ClearHandler, InfoHandler, ListHandler, NextHandler, PosHandler, RemoveHandler, ReqHandler,
};
use super::settings::{PermHandler, RandomHandler, SetHandler, ToggleHandler};
use crate::db::{BlacklistKind, ChannelQuery};
use crate::error::ResCode;
use crate::metrics;
use crate::services::Rank;
use crate::state::App;
use crate::telemetry::{CommandTimer, spans};
use std::collections::HashMap;
use tracing::{Instrument, debug, error};

/// Static description of a command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub args: Option<&'static str>,
    /// Rank required unless a channel overrides it.
    pub default_rank: Rank,
    pub supports_privilege: bool,
    pub privilege_description: Option<&'static str>,
}

impl CommandSpec {
    const fn new(name: &'static str, description: &'static str, default_rank: Rank) -> Self {
        Self {
            name,
            aliases: &[],
            description,
            args: None,
            default_rank,
            supports_privilege: false,
            privilege_description: None,
        }
    }

    const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    const fn args(mut self, args: &'static str) -> Self {
        self.args = Some(args);
        self
    }

    const fn privilege(mut self, description: &'static str) -> Self {
        self.supports_privilege = true;
        self.privilege_description = Some(description);
        self
    }
}

pub struct Command {
    pub spec: CommandSpec,
    handler: Box<dyn Handler>,
}

impl Command {
    pub async fn run(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        self.handler.handle(ctx, args).await
    }
}

/// Registry of chat commands.
pub struct Registry {
    commands: Vec<Command>,
    /// Name and alias to index in `commands`.
    index: HashMap<&'static str, usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with every command registered.
    pub fn new() -> Self {
        let mut registry = Self {
            commands: Vec::new(),
            index: HashMap::new(),
        };

        // Queue
        registry.register(
            CommandSpec::new("req", "Request a level by name or ID", Rank::User)
                .aliases(&["r", "request", "add"])
                .args("<query>"),
            ReqHandler,
        );
        registry.register(
            CommandSpec::new("remove", "Remove your last level from the queue", Rank::User)
                .aliases(&["rm", "oops"])
                .privilege("Remove the overall last level from the queue, or a specific one: [<query>]"),
            RemoveHandler,
        );
        registry.register(
            CommandSpec::new("info", "Get info for a level in the queue", Rank::User)
                .aliases(&["i", "get", "g"])
                .args("[<query>]"),
            InfoHandler,
        );
        registry.register(
            CommandSpec::new("pos", "Get your level's position in the queue, or a specific one", Rank::User)
                .aliases(&["p", "position"])
                .args("[<query>]"),
            PosHandler,
        );
        registry.register(
            CommandSpec::new("list", "Lists levels in the queue", Rank::User)
                .aliases(&["l", "q", "queue"])
                .args("[<page>]"),
            ListHandler,
        );
        registry.register(
            CommandSpec::new("next", "Shifts the queue", Rank::Moderator).aliases(&["n"]),
            NextHandler,
        );
        registry.register(
            CommandSpec::new("clear", "Clear the queue", Rank::Moderator).aliases(&["purge"]),
            ClearHandler,
        );

        // Settings
        registry.register(
            CommandSpec::new("toggle", "Toggle requests", Rank::Moderator).aliases(&["t"]),
            ToggleHandler,
        );
        registry.register(
            CommandSpec::new("random", "Toggle the random queue", Rank::Moderator)
                .aliases(&["rndm", "togglerandom", "randomqueue", "randomq"]),
            RandomHandler,
        );
        registry.register(
            CommandSpec::new("set", "View or edit settings", Rank::Moderator)
                .aliases(&["s", "settings"])
                .args("[<setting> <value>]"),
            SetHandler,
        );
        registry.register(
            CommandSpec::new("perm", "Change the rank required by a command", Rank::Streamer)
                .aliases(&["perms", "permission"])
                .args("<command> <rank>|reset"),
            PermHandler,
        );

        // Blacklists
        registry.register(
            CommandSpec::new("blacklist", "Manage blacklisted users and levels", Rank::Moderator)
                .aliases(&["bl"])
                .args("add|remove|clear [<user>] or level add|remove|clear [<id>]"),
            BlacklistHandler,
        );
        registry.register(
            CommandSpec::new("global-bl", "Manage the global blacklist", Rank::Owner)
                .aliases(&["gbl", "global-blacklist"])
                .args("[users|levels] add|remove|clear [<id>]"),
            GlobalBlacklistHandler,
        );

        // Misc
        registry.register(
            CommandSpec::new(
                "privilege",
                "Run a command in privilege mode for those supporting it",
                Rank::Moderator,
            )
            .aliases(&["pr", "prm", "prmode"])
            .args("<command> [<args>]"),
            PrivilegeHandler,
        );
        registry.register(
            CommandSpec::new("help", "Lists commands", Rank::User)
                .aliases(&["h", "?", "commands", "cmd"])
                .args("[<command>]"),
            HelpHandler,
        );
        registry.register(CommandSpec::new("ping", "Check that the bot is alive", Rank::User), PingHandler);
        registry.register(
            CommandSpec::new("part", "Makes the bot leave the chat and deletes channel data", Rank::Streamer)
                .aliases(&["leave"]),
            PartHandler,
        );
        registry.register(
            CommandSpec::new("broadcast", "Send a message to every connected dashboard's chat", Rank::Owner)
                .aliases(&["bc"])
                .args("<message>"),
            BroadcastHandler,
        );

        registry
    }

    fn register(&mut self, spec: CommandSpec, handler: impl Handler + 'static) {
        let idx = self.commands.len();
        self.index.insert(spec.name, idx);
        for &alias in spec.aliases {
            self.index.insert(alias, idx);
        }
        self.commands.push(Command {
            spec,
            handler: Box::new(handler),
        });
    }

    /// Look up a command by name or alias (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&Command> {
        let name = name.to_lowercase();
        self.index.get(name.as_str()).map(|&idx| &self.commands[idx])
    }

    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter().map(|c| &c.spec)
    }

    /// Handle one chat message.
    ///
    /// Returns `None` when the message is not a known command.
    pub async fn dispatch(&self, app: &App, msg: &ChatMessage) -> Option<Reply> {
        let settings = match app.settings.get(&msg.channel_id) {
            Ok(settings) => settings,
            Err(e) => {
                error!(channel = %msg.channel_id, error = %e, "Failed to load channel settings");
                return Some(Reply::error());
            }
        };
        let prefix = app.prefix_for(settings.prefix.as_deref());

        let body = msg.text.trim_start().strip_prefix(prefix.as_str())?;
        let mut args: Vec<String> = body.split_whitespace().map(str::to_string).collect();
        if args.is_empty() {
            return None;
        }
        let name = args.remove(0);
        let command = self.find(&name)?;
        let spec = &command.spec;

        let _timer = CommandTimer::new(spec.name);
        let span = spans::command(spec.name, &msg.channel_name, &msg.user.user_name);

        let reply = async {
            if app.blacklists.global_has(BlacklistKind::Users, &msg.user.user_id) {
                debug!("Globally blacklisted user ignored");
                return Reply::silent(ResCode::GlobalBlacklisted);
            }

            let query = ChannelQuery::new(&msg.channel_id, &msg.channel_name);
            if let Err(e) = app.db.channels().ensure(&query) {
                error!(error = %e, "Failed to initialize channel records");
                return Reply::error();
            }

            let rank = app.perms.resolve(&msg.channel_id, &msg.user.user_id, msg.flags);
            if !app.perms.can_run(spec.name, spec.default_rank, &msg.channel_id, rank) {
                debug!(%rank, "Command denied");
                let code = if rank == Rank::Blacklisted {
                    ResCode::Blacklisted
                } else {
                    ResCode::Unauthorized
                };
                return Reply::silent(code);
            }

            let ctx = Context {
                app,
                registry: self,
                msg,
                rank,
                prefix: prefix.clone(),
                privileged: false,
            };
            let mut reply = command.run(&ctx, &args).await;

            // part deletes the record holding the flag; addressed replies go out verbatim
            if settings.first_time
                && !reply.is_silent()
                && reply.targets.is_empty()
                && spec.name != "part"
            {
                match app.settings.take_first_time(&msg.channel_id) {
                    Ok(true) => reply.message.push_str(&onboarding_hint(&prefix)),
                    Ok(false) => {}
                    Err(e) => error!(error = %e, "Failed to clear onboarding flag"),
                }
            }
            reply
        }
        .instrument(span)
        .await;

        metrics::record_result(reply.code.as_str());
        Some(reply)
    }
}

fn onboarding_hint(prefix: &str) -> String {
    format!(
        " | Thanks for using the bot! Requests start disabled: type {prefix}toggle to open the queue and {prefix}help for every command."
    )
}
