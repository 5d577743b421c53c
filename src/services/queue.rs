//! Queue engine: the per-channel request lifecycle.
//!
//! Mutating operations (`add_level`, `remove_*`, `next`, `clear`, `purge`)
//! run under a per-channel async gate, so the span from the first read to
//! the final write never interleaves with another mutation of the same
//! channel. `add_level` holds the gate across the content lookup.
//!
//! Writes are computed on a copy of the persisted queue and only become
//! visible when the save succeeds.

use crate::db::{BlacklistKind, ChannelQuery, ChatUser, Database, QueueEntry, StoreError};
use crate::error::QueueError;
use crate::metrics;
use crate::services::blacklist::Blacklists;
use crate::services::lookup::ContentLookup;
use crate::services::settings::SettingsResolver;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

/// Entries per `list` page.
pub const PAGE_SIZE: usize = 10;

/// An entry together with its 1-based position in the whole queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Positioned {
    pub entry: QueueEntry,
    pub position: usize,
}

/// One page of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<Positioned>,
    pub page: usize,
    pub total_pages: usize,
    pub total_entries: usize,
}

/// Result of a dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dequeued {
    pub entry: QueueEntry,
    /// New head of the queue, if anything is left.
    pub up_next: Option<QueueEntry>,
    pub remaining: usize,
}

pub struct QueueEngine {
    db: Database,
    settings: SettingsResolver,
    blacklists: Blacklists,
    content: Arc<dyn ContentLookup>,
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl QueueEngine {
    pub fn new(
        db: Database,
        settings: SettingsResolver,
        blacklists: Blacklists,
        content: Arc<dyn ContentLookup>,
    ) -> Self {
        Self {
            db,
            settings,
            blacklists,
            content,
            gates: DashMap::new(),
        }
    }

    /// Acquire the mutation gate for `channel_id`.
    async fn gate(&self, channel_id: &str) -> OwnedMutexGuard<()> {
        // clone the Arc out so the map shard is not held across the await
        let gate = self
            .gates
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        gate.lock_owned().await
    }

    fn load(&self, channel_id: &str, op: &'static str) -> Result<Vec<QueueEntry>, QueueError> {
        self.db
            .channels()
            .queue(channel_id)
            .map_err(|e| internal(channel_id, op, e))
    }

    fn persist(
        &self,
        channel_id: &str,
        op: &'static str,
        levels: Vec<QueueEntry>,
    ) -> Result<(), QueueError> {
        self.db
            .channels()
            .save_queue(channel_id, levels)
            .map_err(|e| internal(channel_id, op, e))
    }

    /// Resolve `query` and append it for `requester`.
    pub async fn add_level(
        &self,
        channel_id: &str,
        requester: &ChatUser,
        query: &str,
    ) -> Result<Positioned, QueueError> {
        let _gate = self.gate(channel_id).await;

        let settings = self
            .settings
            .get(channel_id)
            .map_err(|e| internal(channel_id, "add", e))?;
        if !settings.enabled {
            return Err(QueueError::Disabled);
        }

        let record = match self.content.resolve(query).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(QueueError::NotFound),
            Err(e) => {
                error!(channel = %channel_id, query = %query, error = %e, "Content lookup failed");
                return Err(QueueError::Internal(e.to_string()));
            }
        };

        if self.blacklists.global_has(BlacklistKind::Content, &record.id) {
            return Err(QueueError::GlobalBlacklisted);
        }
        if self.blacklists.channel_has_content(channel_id, &record.id) {
            return Err(QueueError::Blacklisted);
        }

        let mut levels = self.load(channel_id, "add")?;
        if let Some(existing) = levels.iter().find(|e| e.id == record.id) {
            return Err(QueueError::AlreadyAdded(Box::new(existing.clone())));
        }

        let limit = settings.max_requests_per_user;
        if limit != -1 {
            let held = levels
                .iter()
                .filter(|e| e.requested_by.user_id == requester.user_id)
                .count() as i64;
            if held >= limit {
                return Err(QueueError::MaxPerUser(limit));
            }
        }

        let capacity = settings.max_queue_size;
        if capacity != -1 && levels.len() as i64 >= capacity {
            return Err(QueueError::Full(capacity));
        }

        let entry = QueueEntry {
            id: record.id,
            name: record.name,
            creator_name: record.creator_name,
            requested_by: requester.clone(),
        };
        levels.push(entry.clone());
        let position = levels.len();
        self.persist(channel_id, "add", levels)?;

        metrics::record_queue_mutation("add", 1);
        info!(channel = %channel_id, id = %entry.id, position, user = %requester.user_name, "Entry queued");
        Ok(Positioned { entry, position })
    }

    /// Remove the first entry whose id equals `query` or whose name matches
    /// it case-insensitively.
    pub async fn remove_level(&self, channel_id: &str, query: &str) -> Result<QueueEntry, QueueError> {
        let needle = query.to_lowercase();
        self.remove_where(channel_id, |levels| {
            levels
                .iter()
                .position(|e| e.id == query || e.name.to_lowercase() == needle)
        })
        .await
    }

    /// Remove the most recent entry requested by `user_id`.
    pub async fn remove_own_latest(&self, channel_id: &str, user_id: &str) -> Result<QueueEntry, QueueError> {
        self.remove_where(channel_id, |levels| {
            levels.iter().rposition(|e| e.requested_by.user_id == user_id)
        })
        .await
    }

    /// Remove the tail of the queue.
    pub async fn remove_last(&self, channel_id: &str) -> Result<QueueEntry, QueueError> {
        self.remove_where(channel_id, |levels| levels.len().checked_sub(1))
            .await
    }

    async fn remove_where<F>(&self, channel_id: &str, pick: F) -> Result<QueueEntry, QueueError>
    where
        F: FnOnce(&[QueueEntry]) -> Option<usize>,
    {
        let _gate = self.gate(channel_id).await;

        let mut levels = self.load(channel_id, "remove")?;
        if levels.is_empty() {
            return Err(QueueError::Empty);
        }
        let index = pick(&levels).ok_or(QueueError::NotFound)?;
        let removed = levels.remove(index);
        self.persist(channel_id, "remove", levels)?;

        metrics::record_queue_mutation("remove", -1);
        info!(channel = %channel_id, id = %removed.id, "Entry removed");
        Ok(removed)
    }

    /// Locate an entry by id, then by case-insensitive name. Without a
    /// query, returns the head ("now playing").
    pub fn get_level(&self, channel_id: &str, query: Option<&str>) -> Result<Positioned, QueueError> {
        let levels = self.load(channel_id, "get")?;
        if levels.is_empty() {
            return Err(QueueError::Empty);
        }

        let index = match query {
            None => 0,
            Some(q) => {
                let needle = q.to_lowercase();
                levels
                    .iter()
                    .position(|e| e.id == q)
                    .or_else(|| levels.iter().position(|e| e.name.to_lowercase() == needle))
                    .ok_or(QueueError::NotFound)?
            }
        };

        Ok(Positioned {
            entry: levels[index].clone(),
            position: index + 1,
        })
    }

    /// First entry requested by `user_id`.
    pub fn position_of_user(&self, channel_id: &str, user_id: &str) -> Result<Positioned, QueueError> {
        let levels = self.load(channel_id, "get")?;
        if levels.is_empty() {
            return Err(QueueError::Empty);
        }
        levels
            .iter()
            .position(|e| e.requested_by.user_id == user_id)
            .map(|index| Positioned {
                entry: levels[index].clone(),
                position: index + 1,
            })
            .ok_or(QueueError::NotFound)
    }

    /// A page of the queue (1-indexed, default 1).
    pub fn list(&self, channel_id: &str, page: Option<usize>) -> Result<Page, QueueError> {
        let levels = self.load(channel_id, "list")?;
        if levels.is_empty() {
            return Err(QueueError::Empty);
        }

        let total_pages = levels.len().div_ceil(PAGE_SIZE);
        let page = page.unwrap_or(1);
        if page == 0 || page > total_pages {
            return Err(QueueError::End(total_pages));
        }

        let start = (page - 1) * PAGE_SIZE;
        let entries = levels
            .iter()
            .enumerate()
            .skip(start)
            .take(PAGE_SIZE)
            .map(|(i, entry)| Positioned {
                entry: entry.clone(),
                position: i + 1,
            })
            .collect();

        Ok(Page {
            entries,
            page,
            total_pages,
            total_entries: levels.len(),
        })
    }

    /// Dequeue the head, or a uniformly chosen entry in random mode.
    pub async fn next(&self, channel_id: &str) -> Result<Dequeued, QueueError> {
        let _gate = self.gate(channel_id).await;

        let random = self
            .settings
            .get(channel_id)
            .map_err(|e| internal(channel_id, "next", e))?
            .random_mode;

        let mut levels = self.load(channel_id, "next")?;
        if levels.is_empty() {
            return Err(QueueError::Empty);
        }

        let index = if random {
            rand::thread_rng().gen_range(0..levels.len())
        } else {
            0
        };
        let entry = levels.remove(index);
        let up_next = levels.first().cloned();
        let remaining = levels.len();
        self.persist(channel_id, "next", levels)?;

        metrics::record_queue_mutation("next", -1);
        debug!(channel = %channel_id, id = %entry.id, random, remaining, "Entry dequeued");
        Ok(Dequeued {
            entry,
            up_next,
            remaining,
        })
    }

    /// Truncate the queue, returning how many entries were dropped.
    pub async fn clear(&self, channel_id: &str) -> Result<usize, QueueError> {
        let _gate = self.gate(channel_id).await;

        let levels = self.load(channel_id, "clear")?;
        if levels.is_empty() {
            return Err(QueueError::Empty);
        }
        let cleared = levels.len();
        self.persist(channel_id, "clear", Vec::new())?;

        metrics::record_queue_mutation("clear", -(cleared as i64));
        info!(channel = %channel_id, cleared, "Queue cleared");
        Ok(cleared)
    }

    /// Delete every record of a channel.
    ///
    /// The gate entry outlives the purge; a task already waiting on it would
    /// otherwise run alongside one that locks a fresh gate.
    pub async fn purge(&self, query: &ChannelQuery) -> Result<usize, StoreError> {
        let channel_id = query.channel_id.clone().unwrap_or_default();
        let removed = {
            let _gate = self.gate(&channel_id).await;
            let queued = self.db.channels().queue(&channel_id)?.len();
            let removed = self.db.channels().delete_all(query)?;
            metrics::set_queued_entries(self.db.channels().queued_total()? as i64);
            info!(channel = %channel_id, records = removed, queued, "Channel data purged");
            removed
        };
        Ok(removed)
    }
}

fn internal(channel_id: &str, op: &'static str, err: StoreError) -> QueueError {
    error!(channel = %channel_id, op, error = %err, "Queue persistence failed");
    QueueError::Internal(err.to_string())
}
