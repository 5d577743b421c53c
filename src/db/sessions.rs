//! Session collection: opaque secrets bound to a chat identity.

use super::store::{Document, Store, StoreError};
use chrono::{DateTime, Utc};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};

const SESSION: TableDefinition<u64, &[u8]> = TableDefinition::new("session");

/// A dashboard session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub user_name: String,
    pub secret: String,
    /// Unix epoch milliseconds.
    pub issued_at: i64,
    /// Unix epoch milliseconds.
    pub expires_at: i64,
    /// A live socket is bound to this secret.
    pub active: bool,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() > self.expires_at
    }
}

/// Query over the session collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionQuery {
    pub user_id: Option<String>,
    pub secret: Option<String>,
}

impl SessionQuery {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            secret: None,
        }
    }

    pub fn secret(secret: impl Into<String>) -> Self {
        Self {
            user_id: None,
            secret: Some(secret.into()),
        }
    }

    pub fn any() -> Self {
        Self::default()
    }
}

impl Document for Session {
    type Query = SessionQuery;
    const TABLE: TableDefinition<'static, u64, &'static [u8]> = SESSION;

    fn matches(&self, q: &SessionQuery) -> bool {
        q.user_id.as_deref().is_none_or(|id| id == self.user_id)
            && q.secret.as_deref().is_none_or(|s| s == self.secret)
    }

    fn seed(q: &SessionQuery) -> Self {
        Self {
            user_id: q.user_id.clone().unwrap_or_default(),
            user_name: String::new(),
            secret: q.secret.clone().unwrap_or_default(),
            issued_at: 0,
            expires_at: 0,
            active: false,
        }
    }
}

/// Named lookups over sessions.
pub struct SessionRepository<'a> {
    store: &'a Store,
}

impl<'a> SessionRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn by_user(&self, user_id: &str) -> Result<Option<Session>, StoreError> {
        self.store.load(&SessionQuery::user(user_id))
    }

    pub fn by_secret(&self, secret: &str) -> Result<Option<Session>, StoreError> {
        self.store.load(&SessionQuery::secret(secret))
    }

    pub fn all(&self) -> Result<Vec<Session>, StoreError> {
        self.store.load_all(&SessionQuery::any())
    }

    pub fn upsert<F>(&self, user_id: &str, patch: F) -> Result<Session, StoreError>
    where
        F: FnOnce(&mut Session),
    {
        self.store.save(&SessionQuery::user(user_id), patch)
    }

    /// Patch the session holding `secret`. A missing session stays missing.
    pub fn update_by_secret<F>(&self, secret: &str, patch: F) -> Result<Option<Session>, StoreError>
    where
        F: FnOnce(&mut Session),
    {
        self.store.update(&SessionQuery::secret(secret), patch)
    }

    pub fn delete_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        self.store.delete(&SessionQuery::user(user_id))
    }

    /// Delete one session, matching both fields.
    pub fn delete_exact(&self, user_id: &str, secret: &str) -> Result<Vec<Session>, StoreError> {
        self.store.delete(&SessionQuery {
            user_id: Some(user_id.to_string()),
            secret: Some(secret.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("test.redb")).unwrap();
        store.register::<Session>().unwrap();
        (store, dir)
    }

    #[test]
    fn test_update_by_secret_after_delete_creates_nothing() {
        let (store, _dir) = create_test_store();
        let sessions = SessionRepository::new(&store);
        sessions
            .upsert("u1", |s| {
                s.user_name = "viewer".into();
                s.secret = "s1".into();
            })
            .unwrap();

        assert_eq!(sessions.delete_user("u1").unwrap().len(), 1);
        let patched = sessions.update_by_secret("s1", |s| s.active = false).unwrap();
        assert!(patched.is_none());
        assert!(sessions.by_secret("s1").unwrap().is_none());
        assert!(sessions.all().unwrap().is_empty());
    }

    #[test]
    fn test_update_by_secret_patches_existing() {
        let (store, _dir) = create_test_store();
        let sessions = SessionRepository::new(&store);
        sessions.upsert("u1", |s| s.secret = "s1".into()).unwrap();

        let patched = sessions.update_by_secret("s1", |s| s.active = true).unwrap().unwrap();
        assert!(patched.active);
        assert_eq!(patched.user_id, "u1");
    }
}
