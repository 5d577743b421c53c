//! Permission resolution.
//!
//! Maps a chat identity to a [`Rank`] and decides whether a rank may run a
//! command in a channel, honoring per-channel overrides.

use crate::db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Privilege rank. Lower value = more privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Rank {
    Owner = 0,
    Streamer = 1,
    Moderator = 2,
    Vip = 3,
    Subscriber = 4,
    User = 5,
    Blacklisted = 6,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::Owner,
        Rank::Streamer,
        Rank::Moderator,
        Rank::Vip,
        Rank::Subscriber,
        Rank::User,
        Rank::Blacklisted,
    ];

    #[inline]
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::Owner => "owner",
            Rank::Streamer => "streamer",
            Rank::Moderator => "moderator",
            Rank::Vip => "vip",
            Rank::Subscriber => "subscriber",
            Rank::User => "user",
            Rank::Blacklisted => "blacklisted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "owner" | "dev" => Some(Rank::Owner),
            "streamer" | "broadcaster" => Some(Rank::Streamer),
            "mod" | "moderator" => Some(Rank::Moderator),
            "vip" => Some(Rank::Vip),
            "sub" | "subscriber" => Some(Rank::Subscriber),
            "user" | "everyone" => Some(Rank::User),
            "blacklisted" => Some(Rank::Blacklisted),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Chat role flags as reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleFlags {
    pub broadcaster: bool,
    pub moderator: bool,
    pub vip: bool,
    pub subscriber: bool,
}

/// Per-channel permission setting for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermSetting {
    /// Use the command's compiled-in rank.
    Inherited,
    Overridden(Rank),
}

impl PermSetting {
    /// Rank required, falling back to `default` when inherited.
    #[inline]
    pub fn effective(self, default: Rank) -> Rank {
        match self {
            PermSetting::Inherited => default,
            PermSetting::Overridden(rank) => rank,
        }
    }
}

/// `rank` may run something requiring `required`.
#[inline]
pub fn rank_allows(rank: Rank, required: Rank) -> bool {
    rank.level() <= required.level()
}

/// Resolves ranks and command gates against the database.
#[derive(Clone)]
pub struct PermissionResolver {
    owner_id: String,
    db: Database,
}

impl PermissionResolver {
    pub fn new(owner_id: impl Into<String>, db: Database) -> Self {
        Self {
            owner_id: owner_id.into(),
            db,
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        user_id == self.owner_id
    }

    /// Effective rank of `user_id` in `channel_id`.
    ///
    /// Checks run highest privilege first and the first match wins, so a
    /// flagged moderator on the channel blacklist is still a moderator. A
    /// blacklist read failure counts as blacklisted.
    pub fn resolve(&self, channel_id: &str, user_id: &str, flags: RoleFlags) -> Rank {
        if self.is_owner(user_id) {
            return Rank::Owner;
        }
        if flags.broadcaster || user_id == channel_id {
            return Rank::Streamer;
        }
        if flags.moderator {
            return Rank::Moderator;
        }
        if flags.vip {
            return Rank::Vip;
        }
        if flags.subscriber {
            return Rank::Subscriber;
        }

        match self.db.channels().blacklist(channel_id) {
            Ok(bl) if bl.has_user(user_id) => Rank::Blacklisted,
            Ok(_) => Rank::User,
            Err(e) => {
                error!(channel = %channel_id, user = %user_id, error = %e, "Blacklist lookup failed");
                Rank::Blacklisted
            }
        }
    }

    /// Current override for `cmd` in `channel_id`.
    pub fn setting(&self, channel_id: &str, cmd: &str) -> Option<PermSetting> {
        match self.db.channels().perm_override(channel_id, cmd) {
            Ok(setting) => Some(setting),
            Err(e) => {
                error!(channel = %channel_id, cmd = %cmd, error = %e, "Permission override lookup failed");
                None
            }
        }
    }

    /// Whether `rank` may run `cmd` (compiled-in rank `default`) in `channel_id`.
    ///
    /// An unreadable override restricts the command to the owner.
    pub fn can_run(&self, cmd: &str, default: Rank, channel_id: &str, rank: Rank) -> bool {
        let required = match self.setting(channel_id, cmd) {
            Some(setting) => setting.effective(default),
            None => Rank::Owner,
        };
        let allowed = rank_allows(rank, required);
        debug!(channel = %channel_id, cmd = %cmd, %rank, %required, allowed, "Permission check");
        allowed
    }
}
