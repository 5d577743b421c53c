//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::net::SocketAddr;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.owner_id is required")]
    MissingOwnerId,
    #[error("bot.default_prefix must not be empty")]
    EmptyPrefix,
    #[error("{field} is not a socket address: '{value}'")]
    InvalidListen { field: &'static str, value: String },
    #[error("sessions.ttl_secs must be greater than zero")]
    ZeroSessionTtl,
    #[error("sessions.sweep_interval_secs must be greater than zero")]
    ZeroSweepInterval,
    #[error("lookup.content_url is required")]
    MissingContentUrl,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot.owner_id.trim().is_empty() {
        errors.push(ValidationError::MissingOwnerId);
    }
    if config.bot.default_prefix.is_empty() {
        errors.push(ValidationError::EmptyPrefix);
    }

    if config.http.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListen {
            field: "http.listen",
            value: config.http.listen.clone(),
        });
    }
    if let Some(ref socket) = config.socket
        && socket.listen.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidListen {
            field: "socket.listen",
            value: socket.listen.clone(),
        });
    }

    if config.sessions.ttl_secs == 0 {
        errors.push(ValidationError::ZeroSessionTtl);
    }
    if config.sessions.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.lookup.content_url.is_empty() {
        errors.push(ValidationError::MissingContentUrl);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
