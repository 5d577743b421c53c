//! Domain services.
//!
//! Each service owns one concern and reads/writes through [`crate::db`]:
//! - [`settings`]: per-channel settings with validation
//! - [`permissions`]: ranks and command gating
//! - [`queue`]: the request queue lifecycle
//! - [`sessions`]: dashboard session secrets
//! - [`blacklist`]: global and channel blacklists
//! - [`lookup`]: external content and identity lookups

pub mod blacklist;
pub mod lookup;
pub mod permissions;
pub mod queue;
pub mod sessions;
pub mod settings;

pub use blacklist::Blacklists;
pub use lookup::{ContentLookup, ContentRecord, IdentityLookup, LookupError};
pub use permissions::{PermSetting, PermissionResolver, Rank, RoleFlags, rank_allows};
pub use queue::QueueEngine;
pub use sessions::SessionManager;
pub use settings::SettingsResolver;
