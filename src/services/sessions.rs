//! Session manager.
//!
//! Issues opaque secrets bound to a chat identity, renews them on repeat
//! login and sweeps the stale ones. Every session read and write goes
//! through this manager under one lock, the sweep and global user bans
//! included; none of them awaits while holding it.

use crate::db::{BlacklistKind, ChatUser, Database, Session};
use crate::error::SessionError;
use crate::metrics;
use crate::services::blacklist::Blacklists;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

pub struct SessionManager {
    db: Database,
    blacklists: Blacklists,
    ttl: ChronoDuration,
    /// Open dashboard sockets per secret.
    live: Mutex<HashMap<String, usize>>,
}

impl SessionManager {
    pub fn new(db: Database, blacklists: Blacklists, ttl: Duration) -> Self {
        Self {
            db,
            blacklists,
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::hours(24)),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Issue or renew the session for `user`. The secret is stable across
    /// renewals.
    pub fn login(&self, user: &ChatUser) -> Result<Session, SessionError> {
        self.login_at(user, Utc::now())
    }

    fn login_at(&self, user: &ChatUser, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let _lock = self.live.lock();
        let now_ms = now.timestamp_millis();
        let expires_at = (now + self.ttl).timestamp_millis();

        let session = self.db.sessions().upsert(&user.user_id, |s| {
            if s.secret.is_empty() {
                s.secret = Uuid::new_v4().to_string();
                s.issued_at = now_ms;
            }
            s.user_name = user.user_name.clone();
            s.expires_at = expires_at;
        })?;
        info!(user = %user.user_name, expires_at, "Session issued");
        Ok(session)
    }

    /// Resolve a secret to its session.
    ///
    /// A globally blacklisted owner loses every session they hold.
    pub fn authenticate(&self, secret: &str) -> Result<Session, SessionError> {
        let _lock = self.live.lock();
        let session = self
            .db
            .sessions()
            .by_secret(secret)?
            .ok_or(SessionError::Unauthorized)?;

        if self.blacklists.global_has(BlacklistKind::Users, &session.user_id) {
            self.db.sessions().delete_user(&session.user_id)?;
            info!(user = %session.user_name, "Dropped sessions of globally blacklisted user");
            return Err(SessionError::Blacklisted(session.user_id));
        }
        Ok(session)
    }

    /// Add `user_id` to the global user blacklist and drop their sessions.
    ///
    /// Returns `false` if the user was already listed.
    pub fn ban_user(&self, user_id: &str) -> Result<bool, SessionError> {
        let _lock = self.live.lock();
        let added = self.blacklists.global_add(BlacklistKind::Users, user_id)?;
        let dropped = self.db.sessions().delete_user(user_id)?;
        info!(user = %user_id, sessions = dropped.len(), added, "User globally blacklisted");
        Ok(added)
    }

    /// Set whether a live socket is bound to `secret`.
    pub fn mark_active(&self, secret: &str, active: bool) -> Result<(), SessionError> {
        let _lock = self.live.lock();
        self.set_active(secret, active)
    }

    fn set_active(&self, secret: &str, active: bool) -> Result<(), SessionError> {
        self.db
            .sessions()
            .update_by_secret(secret, |s| s.active = active)?
            .ok_or(SessionError::Unauthorized)?;
        debug!(active, "Session activity changed");
        Ok(())
    }

    /// Register an open socket for `secret` and mark the session active.
    pub fn attach(&self, secret: &str) -> Result<(), SessionError> {
        let mut live = self.live.lock();
        self.set_active(secret, true)?;
        *live.entry(secret.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Release one socket for `secret`. The session turns inactive only when
    /// its last socket closes.
    pub fn detach(&self, secret: &str) -> Result<(), SessionError> {
        let mut live = self.live.lock();
        let remaining = match live.get_mut(secret) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining > 0 {
            return Ok(());
        }
        live.remove(secret);

        match self.set_active(secret, false) {
            // deleted while connected
            Err(SessionError::Unauthorized) => Ok(()),
            other => other,
        }
    }

    /// Delete sessions that are expired and inactive as of `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let _lock = self.live.lock();
        let sessions = self.db.sessions();
        let stale: Vec<Session> = sessions
            .all()?
            .into_iter()
            .filter(|s| !s.active && s.is_expired(now))
            .collect();

        for session in &stale {
            sessions.delete_exact(&session.user_id, &session.secret)?;
        }
        Ok(stale.len())
    }
}

/// Spawn the periodic session sweep.
pub fn spawn_session_sweeper(manager: Arc<SessionManager>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;
            match manager.sweep_expired(Utc::now()) {
                Ok(0) => {}
                Ok(swept) => {
                    metrics::record_sessions_swept(swept);
                    info!(swept, "Expired sessions swept");
                }
                Err(e) => error!(error = %e, "Session sweep failed"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResCode;
    use tempfile::tempdir;

    fn create_test_manager() -> (SessionManager, Blacklists, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.redb")).unwrap();
        let blacklists = Blacklists::new(db.clone());
        let manager = SessionManager::new(db, blacklists.clone(), Duration::from_secs(86_400));
        (manager, blacklists, dir)
    }

    fn viewer() -> ChatUser {
        ChatUser::new("u1", "viewer")
    }

    #[test]
    fn test_login_renews_with_stable_secret() {
        let (manager, _bl, _dir) = create_test_manager();
        let t0 = Utc::now();
        let first = manager.login_at(&viewer(), t0).unwrap();
        let second = manager
            .login_at(&viewer(), t0 + ChronoDuration::hours(1))
            .unwrap();

        assert_eq!(first.secret, second.secret);
        assert_eq!(first.issued_at, second.issued_at);
        assert!(second.expires_at > first.expires_at);
        assert_eq!(first.expires_at, (t0 + ChronoDuration::hours(24)).timestamp_millis());
    }

    #[test]
    fn test_secrets_are_unique_per_user() {
        let (manager, _bl, _dir) = create_test_manager();
        let a = manager.login(&viewer()).unwrap();
        let b = manager.login(&ChatUser::new("u2", "other")).unwrap();
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn test_authenticate() {
        let (manager, _bl, _dir) = create_test_manager();
        let session = manager.login(&viewer()).unwrap();
        assert_eq!(manager.authenticate(&session.secret).unwrap().user_id, "u1");

        let err = manager.authenticate("not-a-secret").unwrap_err();
        assert_eq!(err.code(), ResCode::Unauthorized);
    }

    #[test]
    fn test_authenticate_blacklisted_drops_sessions() {
        let (manager, blacklists, _dir) = create_test_manager();
        let session = manager.login(&viewer()).unwrap();
        // bypasses global_add so the session survives until authenticate
        manager
            .db
            .global()
            .update(|g| g.users.push("u1".to_string()))
            .unwrap();
        assert!(blacklists.global_has(BlacklistKind::Users, "u1"));

        let err = manager.authenticate(&session.secret).unwrap_err();
        assert_eq!(err.code(), ResCode::GlobalBlacklisted);
        assert_eq!(manager.authenticate(&session.secret).unwrap_err().code(), ResCode::Unauthorized);
    }

    #[test]
    fn test_sweep_spares_active_sessions() {
        let (manager, _bl, _dir) = create_test_manager();
        let t0 = Utc::now();
        let idle = manager.login_at(&viewer(), t0).unwrap();
        let live = manager.login_at(&ChatUser::new("u2", "other"), t0).unwrap();
        manager.mark_active(&live.secret, true).unwrap();

        // nothing has expired yet
        assert_eq!(manager.sweep_expired(t0).unwrap(), 0);

        let later = t0 + ChronoDuration::hours(25);
        assert_eq!(manager.sweep_expired(later).unwrap(), 1);
        assert_eq!(manager.authenticate(&idle.secret).unwrap_err().code(), ResCode::Unauthorized);
        assert!(manager.authenticate(&live.secret).is_ok());

        manager.mark_active(&live.secret, false).unwrap();
        assert_eq!(manager.sweep_expired(later).unwrap(), 1);
    }

    #[test]
    fn test_mark_active_unknown_secret() {
        let (manager, _bl, _dir) = create_test_manager();
        assert!(matches!(
            manager.mark_active("missing", true),
            Err(SessionError::Unauthorized)
        ));
    }

    #[test]
    fn test_ban_user_leaves_no_usable_session() {
        let (manager, blacklists, _dir) = create_test_manager();
        let session = manager.login(&viewer()).unwrap();

        assert!(manager.ban_user("u1").unwrap());
        assert!(!manager.ban_user("u1").unwrap());
        assert!(blacklists.global_has(BlacklistKind::Users, "u1"));

        // a socket releasing the secret afterwards must not bring it back
        assert!(matches!(
            manager.mark_active(&session.secret, false),
            Err(SessionError::Unauthorized)
        ));
        manager.detach(&session.secret).unwrap();
        assert!(manager.db.sessions().all().unwrap().is_empty());
        assert_eq!(manager.authenticate(&session.secret).unwrap_err().code(), ResCode::Unauthorized);
    }

    #[test]
    fn test_session_stays_active_until_last_socket_detaches() {
        let (manager, _bl, _dir) = create_test_manager();
        let t0 = Utc::now();
        let session = manager.login_at(&viewer(), t0).unwrap();
        manager.attach(&session.secret).unwrap();
        manager.attach(&session.secret).unwrap();

        manager.detach(&session.secret).unwrap();
        assert!(manager.authenticate(&session.secret).unwrap().active);
        let later = t0 + ChronoDuration::hours(25);
        assert_eq!(manager.sweep_expired(later).unwrap(), 0);

        manager.detach(&session.secret).unwrap();
        assert!(!manager.authenticate(&session.secret).unwrap().active);
        assert_eq!(manager.sweep_expired(later).unwrap(), 1);
    }

    #[test]
    fn test_attach_unknown_secret() {
        let (manager, _bl, _dir) = create_test_manager();
        assert!(matches!(manager.attach("missing"), Err(SessionError::Unauthorized)));
        // nothing was counted, so a stray detach is harmless
        manager.detach("missing").unwrap();
        assert!(manager.db.sessions().all().unwrap().is_empty());
    }
}
