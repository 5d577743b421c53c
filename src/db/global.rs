//! Process-wide blacklist collection.
//!
//! Holds a single record; the query type is `()` and matches it.

use super::store::{Document, Store, StoreError};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};

const GLOBAL_BLACKLIST: TableDefinition<u64, &[u8]> = TableDefinition::new("global_blacklist");

/// Which list of the global blacklist an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistKind {
    Users,
    Content,
}

impl BlacklistKind {
    /// Parse the wire name (`users` / `levels`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "users" | "user" => Some(Self::Users),
            "levels" | "level" | "content" => Some(Self::Content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalBlacklistRecord {
    pub users: Vec<String>,
    pub content_ids: Vec<String>,
}

impl GlobalBlacklistRecord {
    pub fn list(&self, kind: BlacklistKind) -> &Vec<String> {
        match kind {
            BlacklistKind::Users => &self.users,
            BlacklistKind::Content => &self.content_ids,
        }
    }

    pub fn list_mut(&mut self, kind: BlacklistKind) -> &mut Vec<String> {
        match kind {
            BlacklistKind::Users => &mut self.users,
            BlacklistKind::Content => &mut self.content_ids,
        }
    }
}

impl Document for GlobalBlacklistRecord {
    type Query = ();
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = GLOBAL_BLACKLIST;

    fn matches(&self, _: &()) -> bool {
        true
    }

    fn seed(_: &()) -> Self {
        Self::default()
    }
}

pub struct GlobalRepository<'a> {
    store: &'a Store,
}

impl<'a> GlobalRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<GlobalBlacklistRecord, StoreError> {
        Ok(self.store.load(&())?.unwrap_or_default())
    }

    pub fn update<F>(&self, patch: F) -> Result<GlobalBlacklistRecord, StoreError>
    where
        F: FnOnce(&mut GlobalBlacklistRecord),
    {
        self.store.save(&(), patch)
    }
}
