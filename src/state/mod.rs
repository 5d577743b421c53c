//! Application context.
//!
//! [`App`] owns every service and is passed explicitly to the dispatcher,
//! the HTTP server and the socket. Nothing is reached through globals.

use crate::config::Config;
use crate::db::Database;
use crate::services::{
    Blacklists, ContentLookup, IdentityLookup, PermissionResolver, QueueEngine, SessionManager,
    SettingsResolver,
};
use std::sync::Arc;
use std::time::Duration;

/// External collaborators injected at startup.
pub struct Collaborators {
    pub content: Arc<dyn ContentLookup>,
    pub identity: Arc<dyn IdentityLookup>,
}

pub struct App {
    pub config: Config,
    pub db: Database,
    pub settings: SettingsResolver,
    pub perms: PermissionResolver,
    pub queue: QueueEngine,
    pub sessions: Arc<SessionManager>,
    pub blacklists: Blacklists,
    pub identity: Arc<dyn IdentityLookup>,
}

impl App {
    pub fn new(config: Config, db: Database, collaborators: Collaborators) -> Self {
        let settings = SettingsResolver::new(db.clone());
        let blacklists = Blacklists::new(db.clone());
        let perms = PermissionResolver::new(config.bot.owner_id.clone(), db.clone());
        let queue = QueueEngine::new(
            db.clone(),
            settings.clone(),
            blacklists.clone(),
            collaborators.content,
        );
        let sessions = Arc::new(SessionManager::new(
            db.clone(),
            blacklists.clone(),
            Duration::from_secs(config.sessions.ttl_secs),
        ));

        Self {
            config,
            db,
            settings,
            perms,
            queue,
            sessions,
            blacklists,
            identity: collaborators.identity,
        }
    }

    /// Prefix in effect for a channel.
    pub fn prefix_for(&self, channel_prefix: Option<&str>) -> String {
        channel_prefix
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.config.bot.default_prefix)
            .to_string()
    }
}
