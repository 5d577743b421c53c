//! Redb-backed partial-match document store.
//!
//! Each collection lives in its own table. Records are serialized with
//! serde_json and keyed by an insertion sequence number, so table order is
//! insertion order.
//!
//! # Schema
//!
//! ```text
//! <collection>: seq (u64) -> Document (serde_json)
//! ```
//!
//! Lookups scan the collection and compare the supplied query fields; every
//! call runs inside a single redb transaction, so a load-patch-save performed
//! by [`Store::save`] cannot interleave with another writer.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A record type stored in one collection.
///
/// `Query` is the set of fields a caller may match on; a record matches when
/// every field present in the query equals the record's field.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Partial-field query for this collection.
    type Query: Send + Sync;

    /// Backing table.
    const TABLE: TableDefinition<'static, u64, &'static [u8]>;

    /// Whether this record matches every field supplied by `query`.
    fn matches(&self, query: &Self::Query) -> bool;

    /// Default record for this collection with the query fields applied.
    fn seed(query: &Self::Query) -> Self;
}

/// Shared handle to the redb file.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the backing file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;
        info!(path = %path.display(), "Store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Ensure the collection's table exists so read transactions can open it.
    pub fn register<D: Document>(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(D::TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// First record matching `query`, if any.
    pub fn load<D: Document>(&self, query: &D::Query) -> Result<Option<D>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(D::TABLE)?;

        for item in table.iter()? {
            let (_, value) = item?;
            let doc: D = serde_json::from_slice(value.value())?;
            if doc.matches(query) {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Every record matching `query`, in insertion order.
    pub fn load_all<D: Document>(&self, query: &D::Query) -> Result<Vec<D>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(D::TABLE)?;

        let mut docs = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let doc: D = serde_json::from_slice(value.value())?;
            if doc.matches(query) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Apply `patch` to the first record matching `query`.
    ///
    /// When nothing matches, a new record is built from [`Document::seed`],
    /// patched, and appended. Returns the record as written.
    pub fn save<D, F>(&self, query: &D::Query, patch: F) -> Result<D, StoreError>
    where
        D: Document,
        F: FnOnce(&mut D),
    {
        let write_txn = self.db.begin_write()?;
        let doc = {
            let mut table = write_txn.open_table(D::TABLE)?;

            let mut found = None;
            for item in table.iter()? {
                let (key, value) = item?;
                let doc: D = serde_json::from_slice(value.value())?;
                if doc.matches(query) {
                    found = Some((key.value(), doc));
                    break;
                }
            }

            let (key, mut doc) = match found {
                Some(hit) => hit,
                None => {
                    let next = table.last()?.map(|(k, _)| k.value() + 1).unwrap_or(0);
                    (next, D::seed(query))
                }
            };

            patch(&mut doc);
            let bytes = serde_json::to_vec(&doc)?;
            table.insert(key, bytes.as_slice())?;
            doc
        };
        write_txn.commit()?;
        Ok(doc)
    }

    /// Apply `patch` to the first record matching `query`, if there is one.
    ///
    /// Unlike [`Store::save`], nothing is created when no record matches.
    pub fn update<D, F>(&self, query: &D::Query, patch: F) -> Result<Option<D>, StoreError>
    where
        D: Document,
        F: FnOnce(&mut D),
    {
        let write_txn = self.db.begin_write()?;
        let doc = {
            let mut table = write_txn.open_table(D::TABLE)?;

            let mut found = None;
            for item in table.iter()? {
                let (key, value) = item?;
                let doc: D = serde_json::from_slice(value.value())?;
                if doc.matches(query) {
                    found = Some((key.value(), doc));
                    break;
                }
            }

            match found {
                Some((key, mut doc)) => {
                    patch(&mut doc);
                    let bytes = serde_json::to_vec(&doc)?;
                    table.insert(key, bytes.as_slice())?;
                    Some(doc)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(doc)
    }

    /// Remove every record matching `query`, returning the removed records.
    pub fn delete<D: Document>(&self, query: &D::Query) -> Result<Vec<D>, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(D::TABLE)?;

            let mut hits = Vec::new();
            for item in table.iter()? {
                let (key, value) = item?;
                let doc: D = serde_json::from_slice(value.value())?;
                if doc.matches(query) {
                    hits.push((key.value(), doc));
                }
            }

            for (key, _) in &hits {
                table.remove(*key)?;
            }
            hits.into_iter().map(|(_, doc)| doc).collect::<Vec<_>>()
        };
        write_txn.commit()?;

        if !removed.is_empty() {
            debug!(count = removed.len(), "Deleted documents");
        }
        Ok(removed)
    }

    /// Create the record for `query` with defaults if none matches yet.
    ///
    /// Returns `true` when a record was created.
    pub fn ensure<D: Document>(&self, query: &D::Query) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(D::TABLE)?;

            let mut exists = false;
            for item in table.iter()? {
                let (_, value) = item?;
                let doc: D = serde_json::from_slice(value.value())?;
                if doc.matches(query) {
                    exists = true;
                    break;
                }
            }

            if !exists {
                let next = table.last()?.map(|(k, _)| k.value() + 1).unwrap_or(0);
                let bytes = serde_json::to_vec(&D::seed(query))?;
                table.insert(next, bytes.as_slice())?;
            }
            !exists
        };
        write_txn.commit()?;
        Ok(created)
    }

    /// Append undecodable bytes to a collection.
    #[cfg(test)]
    pub(crate) fn insert_raw<D: Document>(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(D::TABLE)?;
            let next = table.last()?.map(|(k, _)| k.value() + 1).unwrap_or(0);
            table.insert(next, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
