//! Blacklist service.
//!
//! - Global tier: process-wide user ids and content ids, owner-managed.
//! - Channel tier: per-channel users and content ids, streamer-managed.
//!
//! Membership checks fail closed: an unreadable list counts as a hit.

use crate::db::{BlacklistKind, ChannelBlacklist, ChatUser, Database, StoreError};
use tracing::{error, info};

/// Blacklist operations over both tiers.
#[derive(Clone)]
pub struct Blacklists {
    db: Database,
}

impl Blacklists {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // Global tier
    // ========================================================================

    /// Whether `id` is on the global `kind` list.
    pub fn global_has(&self, kind: BlacklistKind, id: &str) -> bool {
        match self.db.global().get() {
            Ok(record) => record.list(kind).iter().any(|v| v == id),
            Err(e) => {
                error!(?kind, id = %id, error = %e, "Global blacklist read failed");
                true
            }
        }
    }

    pub fn global_list(&self, kind: BlacklistKind) -> Result<Vec<String>, StoreError> {
        Ok(self.db.global().get()?.list(kind).clone())
    }

    /// Add `id`. Returns `false` if it was already listed.
    ///
    /// Leaves sessions alone; global user bans go through
    /// `SessionManager::ban_user`.
    pub fn global_add(&self, kind: BlacklistKind, id: &str) -> Result<bool, StoreError> {
        let mut added = false;
        self.db.global().update(|record| {
            let list = record.list_mut(kind);
            if !list.iter().any(|v| v == id) {
                list.push(id.to_string());
                added = true;
            }
        })?;

        if added {
            info!(?kind, id = %id, "Added to global blacklist");
        }
        Ok(added)
    }

    /// Remove `id`. Returns `false` if it was not listed.
    pub fn global_remove(&self, kind: BlacklistKind, id: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.db.global().update(|record| {
            let list = record.list_mut(kind);
            let before = list.len();
            list.retain(|v| v != id);
            removed = list.len() != before;
        })?;
        if removed {
            info!(?kind, id = %id, "Removed from global blacklist");
        }
        Ok(removed)
    }

    /// Empty the `kind` list, returning how many ids were dropped.
    pub fn global_clear(&self, kind: BlacklistKind) -> Result<usize, StoreError> {
        let mut cleared = 0;
        self.db.global().update(|record| {
            let list = record.list_mut(kind);
            cleared = list.len();
            list.clear();
        })?;
        info!(?kind, cleared, "Global blacklist cleared");
        Ok(cleared)
    }

    // ========================================================================
    // Channel tier
    // ========================================================================

    pub fn channel(&self, channel_id: &str) -> Result<ChannelBlacklist, StoreError> {
        self.db.channels().blacklist(channel_id)
    }

    /// Whether `content_id` is banned in `channel_id`.
    pub fn channel_has_content(&self, channel_id: &str, content_id: &str) -> bool {
        match self.channel(channel_id) {
            Ok(bl) => bl.has_content(content_id),
            Err(e) => {
                error!(channel = %channel_id, content = %content_id, error = %e, "Channel blacklist read failed");
                true
            }
        }
    }

    /// Add a user. Returns `false` if they were already listed.
    pub fn channel_add_user(&self, channel_id: &str, user: ChatUser) -> Result<bool, StoreError> {
        let mut added = false;
        self.db.channels().update_blacklist(channel_id, |bl| {
            if !bl.has_user(&user.user_id) {
                bl.users.push(user.clone());
                added = true;
            }
        })?;
        if added {
            info!(channel = %channel_id, user = %user.user_name, "User blacklisted in channel");
        }
        Ok(added)
    }

    pub fn channel_remove_user(&self, channel_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.db.channels().update_blacklist(channel_id, |bl| {
            let before = bl.users.len();
            bl.users.retain(|u| u.user_id != user_id);
            removed = bl.users.len() != before;
        })?;
        Ok(removed)
    }

    pub fn channel_add_content(&self, channel_id: &str, content_id: &str) -> Result<bool, StoreError> {
        let mut added = false;
        self.db.channels().update_blacklist(channel_id, |bl| {
            if !bl.has_content(content_id) {
                bl.content_ids.push(content_id.to_string());
                added = true;
            }
        })?;
        if added {
            info!(channel = %channel_id, content = %content_id, "Content blacklisted in channel");
        }
        Ok(added)
    }

    pub fn channel_remove_content(&self, channel_id: &str, content_id: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.db.channels().update_blacklist(channel_id, |bl| {
            let before = bl.content_ids.len();
            bl.content_ids.retain(|c| c != content_id);
            removed = bl.content_ids.len() != before;
        })?;
        Ok(removed)
    }

    /// Empty one list of the channel blacklist.
    pub fn channel_clear(&self, channel_id: &str, kind: BlacklistKind) -> Result<usize, StoreError> {
        let mut cleared = 0;
        self.db.channels().update_blacklist(channel_id, |bl| match kind {
            BlacklistKind::Users => {
                cleared = bl.users.len();
                bl.users.clear();
            }
            BlacklistKind::Content => {
                cleared = bl.content_ids.len();
                bl.content_ids.clear();
            }
        })?;
        Ok(cleared)
    }
}
