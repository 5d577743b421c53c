//! Blacklist command handlers: channel `blacklist` and owner `global-bl`.

use super::context::{Context, Handler, Reply};
use crate::db::{BlacklistKind, ChatUser, StoreError};
use crate::error::{ResCode, SessionError};
use crate::services::lookup::normalize_handle;
use async_trait::async_trait;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Remove,
    Clear,
}

impl Action {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "remove" | "rm" => Some(Self::Remove),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

fn store_failure(ctx: &Context<'_>, e: StoreError) -> Reply {
    error!(channel = %ctx.channel_id(), error = %e, "Blacklist write failed");
    Reply::error()
}

/// Resolve a chat handle to an identity, or the reply to send instead.
async fn resolve_user(ctx: &Context<'_>, raw: &str) -> Result<ChatUser, Reply> {
    let handle = normalize_handle(raw);
    match ctx.app.identity.resolve(&handle).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Reply::new(ResCode::NotFound, "That user doesn't exist.")),
        Err(e) => {
            error!(handle = %handle, error = %e, "Identity lookup failed");
            Err(Reply::new(
                ResCode::Error,
                "An error occurred fetching user data. Please try again.",
            ))
        }
    }
}

pub struct BlacklistHandler;

impl BlacklistHandler {
    async fn users(&self, ctx: &Context<'_>, action: Action, target: Option<&String>) -> Reply {
        let bl = &ctx.app.blacklists;
        let channel_id = ctx.channel_id();

        if action == Action::Clear {
            return match bl.channel_clear(channel_id, BlacklistKind::Users) {
                Ok(_) => Reply::ok("Cleared the blacklist."),
                Err(e) => store_failure(ctx, e),
            };
        }
        let Some(target) = target else {
            return Reply::new(ResCode::InvalidValue, "You must specify a user.");
        };
        let user = match resolve_user(ctx, target).await {
            Ok(user) => user,
            Err(reply) => return reply,
        };
        let name = user.user_name.clone();

        match action {
            Action::Add => match bl.channel_add_user(channel_id, user) {
                Ok(true) => Reply::ok(format!("Added {name} to the blacklist.")),
                Ok(false) => Reply::new(ResCode::AlreadyAdded, "That user is already blacklisted."),
                Err(e) => store_failure(ctx, e),
            },
            _ => match bl.channel_remove_user(channel_id, &user.user_id) {
                Ok(true) => Reply::ok(format!("Removed {name} from the blacklist.")),
                Ok(false) => Reply::new(ResCode::NotFound, "That user isn't blacklisted."),
                Err(e) => store_failure(ctx, e),
            },
        }
    }

    fn content(&self, ctx: &Context<'_>, action: Action, target: Option<&String>) -> Reply {
        let bl = &ctx.app.blacklists;
        let channel_id = ctx.channel_id();

        if action == Action::Clear {
            return match bl.channel_clear(channel_id, BlacklistKind::Content) {
                Ok(_) => Reply::ok("Cleared the level blacklist."),
                Err(e) => store_failure(ctx, e),
            };
        }
        let Some(id) = target else {
            return Reply::new(ResCode::InvalidValue, "You must specify a level ID.");
        };

        match action {
            Action::Add => match bl.channel_add_content(channel_id, id) {
                Ok(true) => Reply::ok(format!("Added level {id} to the blacklist.")),
                Ok(false) => Reply::new(ResCode::AlreadyAdded, "That level is already blacklisted."),
                Err(e) => store_failure(ctx, e),
            },
            _ => match bl.channel_remove_content(channel_id, id) {
                Ok(true) => Reply::ok(format!("Removed level {id} from the blacklist.")),
                Ok(false) => Reply::new(ResCode::NotFound, "That level isn't blacklisted."),
                Err(e) => store_failure(ctx, e),
            },
        }
    }
}

#[async_trait]
impl Handler for BlacklistHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let levels = args
            .first()
            .is_some_and(|a| matches!(a.to_ascii_lowercase().as_str(), "level" | "levels"));
        let rest = if levels { &args[1..] } else { args };

        let Some(action) = rest.first().and_then(|a| Action::parse(a)) else {
            return Reply::new(
                ResCode::InvalidValue,
                "You must select a valid action (add|remove|clear)",
            );
        };

        if levels {
            self.content(ctx, action, rest.get(1))
        } else {
            self.users(ctx, action, rest.get(1)).await
        }
    }
}

pub struct GlobalBlacklistHandler;

#[async_trait]
impl Handler for GlobalBlacklistHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let (kind, rest) = match args.first().and_then(|a| BlacklistKind::parse(&a.to_ascii_lowercase())) {
            Some(kind) => (kind, &args[1..]),
            None => (BlacklistKind::Content, args),
        };
        let Some(action) = rest.first().and_then(|a| Action::parse(a)) else {
            return Reply::new(
                ResCode::InvalidValue,
                "You must select a valid action (add|remove|clear)",
            );
        };
        let bl = &ctx.app.blacklists;

        if action == Action::Clear {
            return match bl.global_clear(kind) {
                Ok(n) => Reply::ok(format!("Cleared {n} entries.")),
                Err(e) => store_failure(ctx, e),
            };
        }
        let Some(target) = rest.get(1) else {
            return Reply::new(ResCode::InvalidValue, "You must specify an ID.");
        };

        let (id, label) = match kind {
            BlacklistKind::Content => (target.clone(), target.clone()),
            BlacklistKind::Users => match resolve_user(ctx, target).await {
                Ok(user) => (user.user_id, user.user_name),
                Err(reply) => return reply,
            },
        };

        // user bans also drop sessions, so they go through the session manager
        let result = match (action, kind) {
            (Action::Add, BlacklistKind::Users) => ctx.app.sessions.ban_user(&id),
            (Action::Add, _) => bl.global_add(kind, &id).map_err(SessionError::from),
            _ => bl.global_remove(kind, &id).map_err(SessionError::from),
        };
        match (action, result) {
            (Action::Add, Ok(true)) => Reply::ok(format!("Added {label}")),
            (Action::Add, Ok(false)) => Reply::new(ResCode::AlreadyAdded, format!("{label} is already blacklisted.")),
            (_, Ok(true)) => Reply::ok(format!("Removed {label}")),
            (_, Ok(false)) => Reply::new(ResCode::NotFound, format!("{label} isn't blacklisted.")),
            (_, Err(e)) => {
                error!(channel = %ctx.channel_id(), error = %e, "Global blacklist write failed");
                Reply::error()
            }
        }
    }
}
