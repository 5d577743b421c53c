//! Unified error handling for slreq.
//!
//! Every domain error maps onto a [`ResCode`], the result taxonomy reported
//! back to the chat bridge. Policy rejections are expected outcomes; only
//! the `Internal` variants represent operational failures.

use crate::db::{QueueEntry, StoreError};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Result codes
// ============================================================================

/// Result code returned to the caller alongside a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResCode {
    Ok,
    NotFound,
    AlreadyAdded,
    MaxPerUser,
    Full,
    Disabled,
    Empty,
    End,
    Blacklisted,
    GlobalBlacklisted,
    InvalidKey,
    InvalidValue,
    InvalidRange,
    Unauthorized,
    Error,
}

impl ResCode {
    /// Static label for metrics and logs.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::AlreadyAdded => "already_added",
            Self::MaxPerUser => "max_per_user",
            Self::Full => "full",
            Self::Disabled => "disabled",
            Self::Empty => "empty",
            Self::End => "end",
            Self::Blacklisted => "blacklisted",
            Self::GlobalBlacklisted => "global_blacklisted",
            Self::InvalidKey => "invalid_key",
            Self::InvalidValue => "invalid_value",
            Self::InvalidRange => "invalid_range",
            Self::Unauthorized => "unauthorized",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ResCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Queue Errors
// ============================================================================

/// Rejections and failures produced by the queue engine.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("requests are disabled")]
    Disabled,

    #[error("no content matches the query")]
    NotFound,

    #[error("{} is already in the queue", .0.id)]
    AlreadyAdded(Box<QueueEntry>),

    #[error("user already holds {0} entries")]
    MaxPerUser(i64),

    #[error("queue is full ({0} entries)")]
    Full(i64),

    #[error("content is blacklisted in this channel")]
    Blacklisted,

    #[error("content is globally blacklisted")]
    GlobalBlacklisted,

    #[error("the queue is empty")]
    Empty,

    #[error("page out of range ({0} pages)")]
    End(usize),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn code(&self) -> ResCode {
        match self {
            Self::Disabled => ResCode::Disabled,
            Self::NotFound => ResCode::NotFound,
            Self::AlreadyAdded(_) => ResCode::AlreadyAdded,
            Self::MaxPerUser(_) => ResCode::MaxPerUser,
            Self::Full(_) => ResCode::Full,
            Self::Blacklisted => ResCode::Blacklisted,
            Self::GlobalBlacklisted => ResCode::GlobalBlacklisted,
            Self::Empty => ResCode::Empty,
            Self::End(_) => ResCode::End,
            Self::Internal(_) => ResCode::Error,
        }
    }
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

// ============================================================================
// Settings Errors
// ============================================================================

/// Errors from validating or persisting a settings write.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown setting: {0}")]
    InvalidKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be -1 or a positive number, got {value}")]
    InvalidRange { key: &'static str, value: i64 },

    #[error("internal error: {0}")]
    Internal(#[from] StoreError),
}

impl SettingsError {
    pub fn code(&self) -> ResCode {
        match self {
            Self::InvalidKey(_) => ResCode::InvalidKey,
            Self::InvalidValue { .. } => ResCode::InvalidValue,
            Self::InvalidRange { .. } => ResCode::InvalidRange,
            Self::Internal(_) => ResCode::Error,
        }
    }
}

// ============================================================================
// Session Errors
// ============================================================================

/// Errors from the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown or expired secret")]
    Unauthorized,

    #[error("user {0} is globally blacklisted")]
    Blacklisted(String),

    #[error("internal error: {0}")]
    Internal(#[from] StoreError),
}

impl SessionError {
    pub fn code(&self) -> ResCode {
        match self {
            Self::Unauthorized => ResCode::Unauthorized,
            Self::Blacklisted(_) => ResCode::GlobalBlacklisted,
            Self::Internal(_) => ResCode::Error,
        }
    }
}
