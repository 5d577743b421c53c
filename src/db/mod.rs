//! Database module for persistent storage.
//!
//! A single Redb file holds every collection:
//! - Channel settings, queues, permission overrides and blacklists
//! - Dashboard sessions
//! - The global blacklist
//!
//! Collections are generic documents (see [`store`]); the repositories
//! returned by [`Database`] expose named queries on top of them.

mod channels;
mod global;
mod sessions;
pub mod store;

pub use channels::{
    ChannelBlacklist, ChannelPerms, ChannelQuery, ChannelQueue, ChannelRepository,
    ChannelSettings, ChatUser, PermissionOverride, QueueEntry,
};
pub use global::{BlacklistKind, GlobalBlacklistRecord, GlobalRepository};
pub use sessions::{Session, SessionQuery, SessionRepository};
pub use store::{Document, Store, StoreError};

use std::path::Path;
use tracing::info;

/// Database handle shared across services.
#[derive(Clone)]
pub struct Database {
    store: Store,
}

impl Database {
    /// Open the backing file and make sure every collection exists.
    ///
    /// Any failure here is fatal to startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Store::open(path)?;
        store.register::<ChannelSettings>()?;
        store.register::<ChannelQueue>()?;
        store.register::<ChannelPerms>()?;
        store.register::<ChannelBlacklist>()?;
        store.register::<Session>()?;
        store.register::<GlobalBlacklistRecord>()?;

        info!("Database collections checked");
        Ok(Self { store })
    }

    /// Raw document store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Get channel repository.
    pub fn channels(&self) -> ChannelRepository<'_> {
        ChannelRepository::new(&self.store)
    }

    /// Get session repository.
    pub fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.store)
    }

    /// Get global blacklist repository.
    pub fn global(&self) -> GlobalRepository<'_> {
        GlobalRepository::new(&self.store)
    }
}
