//! Configuration loading and management.
//!
//! - [`types`]: Config struct definitions and loading
//! - [`validation`]: startup checks

mod types;
mod validation;

pub use types::{
    BotConfig, Config, ConfigError, DatabaseConfig, HttpConfig, IdentityConfig, LogConfig,
    LogFormat, LookupConfig, SessionsConfig, SocketConfig,
};
pub use validation::{ValidationError, validate};
