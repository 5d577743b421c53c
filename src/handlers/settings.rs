//! Settings command handlers: toggle, random, set, perm.

use super::context::{Context, Handler, Reply};
use crate::error::{ResCode, SettingsError};
use crate::services::settings::SettingChange;
use crate::services::{PermSetting, Rank, rank_allows};
use async_trait::async_trait;
use tracing::{error, info};

pub struct ToggleHandler;

#[async_trait]
impl Handler for ToggleHandler {
    async fn handle(&self, ctx: &Context<'_>, _args: &[String]) -> Reply {
        match ctx.app.settings.toggle(ctx.channel_id()) {
            Ok(enabled) => Reply::ok(format!(
                "Requests are now {}.",
                if enabled { "enabled" } else { "disabled" }
            )),
            Err(e) => {
                error!(channel = %ctx.channel_id(), error = %e, "Toggle failed");
                Reply::error()
            }
        }
    }
}

pub struct RandomHandler;

#[async_trait]
impl Handler for RandomHandler {
    async fn handle(&self, ctx: &Context<'_>, _args: &[String]) -> Reply {
        match ctx.app.settings.toggle_random(ctx.channel_id()) {
            Ok(true) => Reply::ok(format!(
                "Random queue is now enabled. Typing {}next will now pick a random level from the queue.",
                ctx.prefix
            )),
            Ok(false) => Reply::ok("Random queue is now disabled. The queue order is followed as normal."),
            Err(e) => {
                error!(channel = %ctx.channel_id(), error = %e, "Random toggle failed");
                Reply::error()
            }
        }
    }
}

pub struct SetHandler;

#[async_trait]
impl Handler for SetHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let Some(key) = args.first() else {
            return match ctx.app.settings.get(ctx.channel_id()) {
                Ok(s) => Reply::ok(format!(
                    "Settings: enabled:{} - prefix:{} - max_requests_per_user:{} - max_queue_size:{} - random_mode:{}",
                    s.enabled, ctx.prefix, s.max_requests_per_user, s.max_queue_size, s.random_mode
                )),
                Err(e) => {
                    error!(channel = %ctx.channel_id(), error = %e, "Settings read failed");
                    Reply::error()
                }
            };
        };
        let value = args.get(1).map(String::as_str).unwrap_or_default();

        match ctx.app.settings.set(ctx.channel_id(), key, value) {
            Ok(_) => Reply::ok(format!("Set '{key}' to '{value}'")),
            Err(e) => {
                let message = match &e {
                    SettingsError::InvalidKey(_) => format!(
                        "Error: invalid key (one of: {})",
                        SettingChange::KEYS.join(", ")
                    ),
                    SettingsError::InvalidValue { .. } => "Error: invalid value".to_string(),
                    SettingsError::InvalidRange { key, .. } => {
                        format!("Error: {key} must be -1 (unlimited) or a positive number")
                    }
                    SettingsError::Internal(_) => return Reply::error(),
                };
                Reply::new(e.code(), message)
            }
        }
    }
}

pub struct PermHandler;

#[async_trait]
impl Handler for PermHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let (Some(name), Some(raw_rank)) = (args.first(), args.get(1)) else {
            return Reply::new(
                ResCode::InvalidValue,
                format!("Usage: {}perm <command> <rank>|reset", ctx.prefix),
            );
        };
        let Some(command) = ctx.registry.find(name) else {
            return Reply::new(ResCode::InvalidKey, "That command doesn't exist.");
        };
        let spec = &command.spec;
        let channel_id = ctx.channel_id();

        // callers may only touch commands they can run themselves
        if !ctx.app.perms.can_run(spec.name, spec.default_rank, channel_id, ctx.rank) {
            return Reply::silent(ResCode::Unauthorized);
        }

        let setting = if raw_rank.eq_ignore_ascii_case("reset") {
            PermSetting::Inherited
        } else {
            match Rank::parse(raw_rank) {
                Some(Rank::Blacklisted) | None => {
                    return Reply::new(
                        ResCode::InvalidValue,
                        "Invalid rank (owner, streamer, moderator, vip, subscriber, user or reset)",
                    );
                }
                Some(rank) if !rank_allows(ctx.rank, rank) => {
                    return Reply::new(ResCode::InvalidRange, "You can't require a rank above your own.");
                }
                Some(rank) => PermSetting::Overridden(rank),
            }
        };

        if let Err(e) = ctx.app.db.channels().set_perm_override(channel_id, spec.name, setting) {
            error!(channel = %channel_id, cmd = spec.name, error = %e, "Failed to store permission override");
            return Reply::error();
        }
        info!(channel = %channel_id, cmd = spec.name, ?setting, "Permission override changed");

        match setting {
            PermSetting::Inherited => Reply::ok(format!(
                "'{}' reset to its default rank ({}).",
                spec.name, spec.default_rank
            )),
            PermSetting::Overridden(rank) => Reply::ok(format!("'{}' now requires {rank}.", spec.name)),
        }
    }
}
