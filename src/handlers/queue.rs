//! Queue command handlers: req, remove, info, pos, list, next, clear.

use super::context::{Context, Handler, Reply};
use crate::db::QueueEntry;
use crate::error::{QueueError, ResCode};
use async_trait::async_trait;

/// Reply for queue rejections shared by every queue command.
pub(super) fn rejection(err: QueueError) -> Reply {
    let code = err.code();
    let message = match err {
        QueueError::Disabled => "Requests are disabled.".to_string(),
        QueueError::NotFound => "That level is not in the queue.".to_string(),
        QueueError::AlreadyAdded(entry) => format!("'{}' is already in the queue.", entry.name),
        QueueError::MaxPerUser(limit) => {
            format!("You have the max amount of levels in the queue ({limit}).")
        }
        QueueError::Full(capacity) => format!("The queue is full (max {capacity} levels)."),
        QueueError::Blacklisted => "That level is blacklisted in this channel.".to_string(),
        QueueError::GlobalBlacklisted => "That level is globally blacklisted.".to_string(),
        QueueError::Empty => "The queue is empty.".to_string(),
        QueueError::End(pages) => format!("There aren't that many pages ({pages} total)."),
        QueueError::Internal(_) => return Reply::error(),
    };
    Reply::new(code, message)
}

fn describe(entry: &QueueEntry) -> String {
    format!("'{}' ({}) by {}", entry.name, entry.id, entry.creator_name)
}

fn joined(args: &[String]) -> Option<String> {
    let query = args.join(" ");
    let query = query.trim();
    (!query.is_empty()).then(|| query.to_string())
}

pub struct ReqHandler;

#[async_trait]
impl Handler for ReqHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let Some(query) = joined(args) else {
            return Reply::new(ResCode::InvalidValue, "You need to specify a query.");
        };

        match ctx.app.queue.add_level(ctx.channel_id(), ctx.user(), &query).await {
            Ok(added) => Reply::ok(format!(
                "Added {} to the queue at position {}",
                describe(&added.entry),
                added.position
            )),
            Err(QueueError::NotFound) => Reply::new(
                ResCode::NotFound,
                "Couldn't find a level matching that query (is it unlisted?)",
            ),
            Err(e) => rejection(e),
        }
    }
}

pub struct RemoveHandler;

#[async_trait]
impl Handler for RemoveHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let queue = &ctx.app.queue;
        let result = if ctx.privileged {
            match joined(args) {
                Some(query) => queue.remove_level(ctx.channel_id(), &query).await,
                None => queue.remove_last(ctx.channel_id()).await,
            }
        } else {
            match queue.remove_own_latest(ctx.channel_id(), &ctx.user().user_id).await {
                Err(QueueError::NotFound) => {
                    return Reply::new(ResCode::NotFound, "You don't have any levels in the queue.");
                }
                other => other,
            }
        };

        match result {
            Ok(entry) => Reply::ok(format!(
                "Removed '{}' by {} from the queue.",
                entry.name, entry.creator_name
            )),
            Err(e) => rejection(e),
        }
    }
}

pub struct InfoHandler;

#[async_trait]
impl Handler for InfoHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let query = joined(args);
        match ctx.app.queue.get_level(ctx.channel_id(), query.as_deref()) {
            Ok(found) => {
                let title = if query.is_some() { "Level Info" } else { "Now Playing" };
                let e = &found.entry;
                Reply::ok(format!(
                    "{title} | Level: '{}' | Creator: {} | ID: {} | Requested by: {}",
                    e.name, e.creator_name, e.id, e.requested_by.user_name
                ))
            }
            Err(QueueError::NotFound) => Reply::new(ResCode::NotFound, "Couldn't find that level."),
            Err(e) => rejection(e),
        }
    }
}

pub struct PosHandler;

#[async_trait]
impl Handler for PosHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let queue = &ctx.app.queue;
        match joined(args) {
            Some(query) => match queue.get_level(ctx.channel_id(), Some(&query)) {
                Ok(found) => Reply::ok(format!(
                    "'{}' is at position {} in the queue.",
                    found.entry.name, found.position
                )),
                Err(e) => rejection(e),
            },
            None => match queue.position_of_user(ctx.channel_id(), &ctx.user().user_id) {
                Ok(found) => Reply::ok(format!(
                    "Your level ({}) is at position {} in the queue.",
                    found.entry.name, found.position
                )),
                Err(QueueError::NotFound) => {
                    Reply::new(ResCode::NotFound, "You don't have any levels in the queue.")
                }
                Err(e) => rejection(e),
            },
        }
    }
}

pub struct ListHandler;

#[async_trait]
impl Handler for ListHandler {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply {
        let page = match args.first() {
            None => None,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => return Reply::new(ResCode::InvalidValue, "That's not a page number."),
            },
        };

        match ctx.app.queue.list(ctx.channel_id(), page) {
            Ok(page) => {
                let items = page
                    .entries
                    .iter()
                    .map(|p| format!("{}. {} ({})", p.position, p.entry.name, p.entry.id))
                    .collect::<Vec<_>>()
                    .join(" - ");
                Reply::ok(format!(
                    "Page {} of {} ({} levels) | {items}",
                    page.page, page.total_pages, page.total_entries
                ))
            }
            Err(e) => rejection(e),
        }
    }
}

pub struct NextHandler;

#[async_trait]
impl Handler for NextHandler {
    async fn handle(&self, ctx: &Context<'_>, _args: &[String]) -> Reply {
        match ctx.app.queue.next(ctx.channel_id()).await {
            Ok(out) => {
                let mut message = format!(
                    "Next level: {}, requested by {}",
                    describe(&out.entry),
                    out.entry.requested_by.user_name
                );
                match out.up_next {
                    Some(up) => message.push_str(&format!(" | Up next: '{}'", up.name)),
                    None => message.push_str(" | The queue is now empty."),
                }
                Reply::ok(message)
            }
            Err(e) => rejection(e),
        }
    }
}

pub struct ClearHandler;

#[async_trait]
impl Handler for ClearHandler {
    async fn handle(&self, ctx: &Context<'_>, _args: &[String]) -> Reply {
        match ctx.app.queue.clear(ctx.channel_id()).await {
            Ok(cleared) => Reply::ok(format!("Queue cleared ({cleared} levels).")),
            Err(e) => rejection(e),
        }
    }
}
