//! Misc command handlers: privilege, help, ping, part, broadcast.

use super::context::{Context, Handler, Reply};
use crate::db::ChannelQuery;
use crate::error::ResCode;
use crate::services::Rank;
use async_trait::async_trait;
use tracing::{error, info};

pub struct PrivilegeHandler;

#[async_trait]
impl Handler for PrivilegeHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let Some((name, rest)) = args.split_first() else {
            return Reply::new(ResCode::InvalidValue, "Specify a command to run in privilege mode.");
        };
        let Some(command) = ctx.registry.find(name) else {
            return Reply::silent(ResCode::NotFound);
        };
        let spec = &command.spec;

        if !ctx
            .app
            .perms
            .can_run(spec.name, spec.default_rank, ctx.channel_id(), ctx.rank)
        {
            return Reply::silent(ResCode::Unauthorized);
        }
        if !spec.supports_privilege {
            return Reply::new(ResCode::InvalidKey, "This command doesn't support privilege mode.");
        }

        info!(cmd = spec.name, "Running command in privilege mode");
        let inner = Context {
            app: ctx.app,
            registry: ctx.registry,
            msg: ctx.msg,
            rank: ctx.rank,
            prefix: ctx.prefix.clone(),
            privileged: true,
        };
        command.run(&inner, rest).await
    }
}

pub struct HelpHandler;

#[async_trait]
impl Handler for HelpHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let p = &ctx.prefix;

        let Some(name) = args.first() else {
            let names = ctx
                .registry
                .specs()
                .filter(|s| s.default_rank != Rank::Owner)
                .map(|s| format!("{p}{}", s.name))
                .collect::<Vec<_>>()
                .join(" - ");
            return Reply::ok(format!("{p}help <command> for more info | {names}"));
        };

        let Some(command) = ctx.registry.find(name) else {
            return Reply::new(ResCode::NotFound, "That command doesn't exist.");
        };
        let spec = &command.spec;
        let usage = match spec.args {
            Some(args) => format!("{p}{} {args}", spec.name),
            None => "none".to_string(),
        };
        let aliases = if spec.aliases.is_empty() {
            "none".to_string()
        } else {
            spec.aliases.join(", ")
        };

        let mut message = format!(
            "{p}{}: {} | args: {usage} | aliases: {aliases}",
            spec.name, spec.description
        );
        if let Some(privilege) = spec.privilege_description {
            message.push_str(&format!(" | privilege mode ({p}privilege {}): {privilege}", spec.name));
        }
        Reply::ok(message)
    }
}

pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, _ctx: &Context<'_>, _args: &[String]) -> Reply {
        Reply::ok("pong")
    }
}

pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &Context<'_>, _args: &[String]) -> Reply {
        let query = ChannelQuery::id(ctx.channel_id());
        match ctx.app.queue.purge(&query).await {
            Ok(records) => {
                info!(channel = %ctx.msg.channel_name, records, "Channel left");
                Reply::ok("Leaving the chat... Thanks for using the bot!")
            }
            Err(e) => {
                error!(channel = %ctx.channel_id(), error = %e, "Failed to delete channel data");
                Reply::error()
            }
        }
    }
}

/// Relays the owner's text to the chat of every user with a live dashboard.
pub struct BroadcastHandler;

#[async_trait]
impl Handler for BroadcastHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        if args.is_empty() {
            return Reply::new(ResCode::InvalidValue, "Specify a message to broadcast.");
        }

        let sessions = match ctx.app.db.sessions().all() {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, "Failed to list sessions");
                return Reply::error();
            }
        };
        let targets: Vec<String> = sessions
            .into_iter()
            .filter(|s| s.active)
            .map(|s| s.user_name)
            .collect();
        if targets.is_empty() {
            return Reply::new(ResCode::Empty, "No active sessions");
        }

        info!(targets = targets.len(), "Broadcasting");
        Reply::ok(args.join(" ")).addressed_to(targets)
    }
}
