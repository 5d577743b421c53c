//! Per-channel collections: settings, queue, permission overrides, blacklist.
//!
//! Every record carries `channel_id` and `channel_name`; lookups go through
//! [`ChannelQuery`].

use super::store::{Document, Store, StoreError};
use crate::services::permissions::{PermSetting, Rank};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};

const SETTINGS: TableDefinition<u64, &[u8]> = TableDefinition::new("settings");
const LEVELS: TableDefinition<u64, &[u8]> = TableDefinition::new("levels");
const PERMS: TableDefinition<u64, &[u8]> = TableDefinition::new("perms");
const BLACKLIST: TableDefinition<u64, &[u8]> = TableDefinition::new("blacklist");

/// Query over channel-keyed collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelQuery {
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
}

impl ChannelQuery {
    /// Match on the stable channel id.
    pub fn id(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            channel_name: None,
        }
    }

    /// Match on both id and display name.
    pub fn new(channel_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            channel_name: Some(channel_name.into()),
        }
    }

    fn matches(&self, channel_id: &str, channel_name: &str) -> bool {
        self.channel_id.as_deref().is_none_or(|id| id == channel_id)
            && self.channel_name.as_deref().is_none_or(|n| n == channel_name)
    }

    fn seed_id(&self) -> String {
        self.channel_id.clone().unwrap_or_default()
    }

    fn seed_name(&self) -> String {
        self.channel_name.clone().unwrap_or_default()
    }
}

/// A chat identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub user_id: String,
    pub user_name: String,
}

impl ChatUser {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Per-channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub channel_id: String,
    pub channel_name: String,
    pub enabled: bool,
    /// Per-channel prefix; `None` falls back to the configured default.
    pub prefix: Option<String>,
    /// -1 = unlimited.
    pub max_requests_per_user: i64,
    /// -1 = unlimited.
    pub max_queue_size: i64,
    pub random_mode: bool,
    pub first_time: bool,
}

impl Document for ChannelSettings {
    type Query = ChannelQuery;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = SETTINGS;

    fn matches(&self, q: &ChannelQuery) -> bool {
        q.matches(&self.channel_id, &self.channel_name)
    }

    fn seed(q: &ChannelQuery) -> Self {
        Self {
            channel_id: q.seed_id(),
            channel_name: q.seed_name(),
            enabled: false,
            prefix: None,
            max_requests_per_user: 2,
            max_queue_size: -1,
            random_mode: false,
            first_time: true,
        }
    }
}

// ============================================================================
// Queue
// ============================================================================

/// One pending content request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub name: String,
    pub creator_name: String,
    pub requested_by: ChatUser,
}

/// The ordered queue of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelQueue {
    pub channel_id: String,
    pub channel_name: String,
    pub levels: Vec<QueueEntry>,
}

impl Document for ChannelQueue {
    type Query = ChannelQuery;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = LEVELS;

    fn matches(&self, q: &ChannelQuery) -> bool {
        q.matches(&self.channel_id, &self.channel_name)
    }

    fn seed(q: &ChannelQuery) -> Self {
        Self {
            channel_id: q.seed_id(),
            channel_name: q.seed_name(),
            levels: Vec::new(),
        }
    }
}

// ============================================================================
// Permission overrides
// ============================================================================

/// A per-channel rank override for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    pub cmd: String,
    pub rank: Rank,
}

/// Sparse list of overrides for a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPerms {
    pub channel_id: String,
    pub channel_name: String,
    pub perms: Vec<PermissionOverride>,
}

impl Document for ChannelPerms {
    type Query = ChannelQuery;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = PERMS;

    fn matches(&self, q: &ChannelQuery) -> bool {
        q.matches(&self.channel_id, &self.channel_name)
    }

    fn seed(q: &ChannelQuery) -> Self {
        Self {
            channel_id: q.seed_id(),
            channel_name: q.seed_name(),
            perms: Vec::new(),
        }
    }
}

// ============================================================================
// Channel blacklist
// ============================================================================

/// Users and content ids banned in one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBlacklist {
    pub channel_id: String,
    pub channel_name: String,
    pub users: Vec<ChatUser>,
    pub content_ids: Vec<String>,
}

impl ChannelBlacklist {
    pub fn has_user(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.user_id == user_id)
    }

    pub fn has_content(&self, content_id: &str) -> bool {
        self.content_ids.iter().any(|c| c == content_id)
    }
}

impl Document for ChannelBlacklist {
    type Query = ChannelQuery;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = BLACKLIST;

    fn matches(&self, q: &ChannelQuery) -> bool {
        q.matches(&self.channel_id, &self.channel_name)
    }

    fn seed(q: &ChannelQuery) -> Self {
        Self {
            channel_id: q.seed_id(),
            channel_name: q.seed_name(),
            users: Vec::new(),
            content_ids: Vec::new(),
        }
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Named lookups over the channel collections.
pub struct ChannelRepository<'a> {
    store: &'a Store,
}

impl<'a> ChannelRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Lazily create every per-channel record.
    ///
    /// Returns `true` if the channel had no settings record yet.
    pub fn ensure(&self, query: &ChannelQuery) -> Result<bool, StoreError> {
        let created = self.store.ensure::<ChannelSettings>(query)?;
        self.store.ensure::<ChannelQueue>(query)?;
        self.store.ensure::<ChannelPerms>(query)?;
        self.store.ensure::<ChannelBlacklist>(query)?;
        Ok(created)
    }

    /// Drop every per-channel record.
    pub fn delete_all(&self, query: &ChannelQuery) -> Result<usize, StoreError> {
        let mut count = self.store.delete::<ChannelSettings>(query)?.len();
        count += self.store.delete::<ChannelQueue>(query)?.len();
        count += self.store.delete::<ChannelPerms>(query)?.len();
        count += self.store.delete::<ChannelBlacklist>(query)?.len();
        Ok(count)
    }

    pub fn settings(&self, channel_id: &str) -> Result<ChannelSettings, StoreError> {
        let query = ChannelQuery::id(channel_id);
        match self.store.load::<ChannelSettings>(&query)? {
            Some(settings) => Ok(settings),
            None => Ok(ChannelSettings::seed(&query)),
        }
    }

    pub fn update_settings<F>(&self, channel_id: &str, patch: F) -> Result<ChannelSettings, StoreError>
    where
        F: FnOnce(&mut ChannelSettings),
    {
        self.store.save(&ChannelQuery::id(channel_id), patch)
    }

    pub fn queue(&self, channel_id: &str) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self
            .store
            .load::<ChannelQueue>(&ChannelQuery::id(channel_id))?
            .map(|q| q.levels)
            .unwrap_or_default())
    }

    pub fn save_queue(&self, channel_id: &str, levels: Vec<QueueEntry>) -> Result<(), StoreError> {
        self.store
            .save::<ChannelQueue, _>(&ChannelQuery::id(channel_id), |q| q.levels = levels)?;
        Ok(())
    }

    /// Total entries across every channel queue.
    pub fn queued_total(&self) -> Result<usize, StoreError> {
        Ok(self
            .store
            .load_all::<ChannelQueue>(&ChannelQuery::default())?
            .iter()
            .map(|q| q.levels.len())
            .sum())
    }

    pub fn perm_override(&self, channel_id: &str, cmd: &str) -> Result<PermSetting, StoreError> {
        Ok(self
            .store
            .load::<ChannelPerms>(&ChannelQuery::id(channel_id))?
            .and_then(|p| p.perms.into_iter().find(|o| o.cmd == cmd))
            .map_or(PermSetting::Inherited, |o| PermSetting::Overridden(o.rank)))
    }

    /// Store an override for `cmd`; `Inherited` drops the entry.
    pub fn set_perm_override(
        &self,
        channel_id: &str,
        cmd: &str,
        setting: PermSetting,
    ) -> Result<(), StoreError> {
        self.store
            .save::<ChannelPerms, _>(&ChannelQuery::id(channel_id), |p| {
                p.perms.retain(|o| o.cmd != cmd);
                if let PermSetting::Overridden(rank) = setting {
                    p.perms.push(PermissionOverride {
                        cmd: cmd.to_string(),
                        rank,
                    });
                }
            })?;
        Ok(())
    }

    pub fn blacklist(&self, channel_id: &str) -> Result<ChannelBlacklist, StoreError> {
        let query = ChannelQuery::id(channel_id);
        match self.store.load::<ChannelBlacklist>(&query)? {
            Some(bl) => Ok(bl),
            None => Ok(ChannelBlacklist::seed(&query)),
        }
    }

    pub fn update_blacklist<F>(&self, channel_id: &str, patch: F) -> Result<ChannelBlacklist, StoreError>
    where
        F: FnOnce(&mut ChannelBlacklist),
    {
        self.store.save(&ChannelQuery::id(channel_id), patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::tempdir;

    fn create_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn entry(id: &str) -> QueueEntry {
        QueueEntry {
            id: id.to_string(),
            name: format!("Level {id}"),
            creator_name: "maker".to_string(),
            requested_by: ChatUser::new("u1", "viewer"),
        }
    }

    #[test]
    fn test_settings_default_when_missing() {
        let (db, _dir) = create_test_db();
        let settings = db.channels().settings("c1").unwrap();
        assert_eq!(settings.channel_id, "c1");
        assert_eq!(settings.max_requests_per_user, 2);
        assert_eq!(settings.max_queue_size, -1);
        assert!(settings.first_time);
    }

    #[test]
    fn test_ensure_creates_every_collection() {
        let (db, _dir) = create_test_db();
        let query = ChannelQuery::new("c1", "streamer");
        assert!(db.channels().ensure(&query).unwrap());
        assert!(!db.channels().ensure(&query).unwrap());

        assert_eq!(db.channels().settings("c1").unwrap().channel_name, "streamer");
        assert!(db.channels().queue("c1").unwrap().is_empty());
        assert_eq!(db.channels().delete_all(&ChannelQuery::id("c1")).unwrap(), 4);
    }

    #[test]
    fn test_queue_round_trip_is_isolated_per_channel() {
        let (db, _dir) = create_test_db();
        db.channels().save_queue("c1", vec![entry("1"), entry("2")]).unwrap();
        db.channels().save_queue("c2", vec![entry("3")]).unwrap();

        assert_eq!(db.channels().queue("c1").unwrap().len(), 2);
        assert_eq!(db.channels().queue("c2").unwrap()[0].id, "3");
        assert_eq!(db.channels().queued_total().unwrap(), 3);
    }

    #[test]
    fn test_perm_override_set_and_reset() {
        let (db, _dir) = create_test_db();
        let channels = db.channels();
        channels
            .set_perm_override("c1", "next", PermSetting::Overridden(Rank::Vip))
            .unwrap();
        assert_eq!(
            channels.perm_override("c1", "next").unwrap(),
            PermSetting::Overridden(Rank::Vip)
        );

        channels
            .set_perm_override("c1", "next", PermSetting::Overridden(Rank::User))
            .unwrap();
        assert_eq!(
            channels.perm_override("c1", "next").unwrap(),
            PermSetting::Overridden(Rank::User)
        );

        channels
            .set_perm_override("c1", "next", PermSetting::Inherited)
            .unwrap();
        assert_eq!(channels.perm_override("c1", "next").unwrap(), PermSetting::Inherited);
    }
}
