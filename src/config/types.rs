//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity.
    pub bot: BotConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session API listener.
    #[serde(default)]
    pub http: HttpConfig,
    /// Optional dashboard socket listener.
    pub socket: Option<SocketConfig>,
    /// Content lookup service.
    #[serde(default)]
    pub lookup: LookupConfig,
    /// Identity lookup service.
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// User id granted the Owner rank everywhere.
    pub owner_id: String,
    /// Command prefix for channels that have not set their own.
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_listen")]
    pub listen: String,
    /// Shared secret of the chat bridge. Bridge routes reject every call
    /// when unset.
    pub bridge_token: Option<String>,
    /// Required `version` header of dashboard clients, if any.
    pub client_version: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            bridge_token: None,
            client_version: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_content_url")]
    pub content_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            content_url: default_content_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_helix_url")]
    pub helix_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            helix_url: default_helix_url(),
            client_id: String::new(),
            access_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Lifetime granted on login and each renewal.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_db_path() -> String {
    "data/slreq.redb".to_string()
}

fn default_http_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_content_url() -> String {
    "https://gdbrowser.com/api/search".to_string()
}

fn default_helix_url() -> String {
    "https://api.twitch.tv/helix".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_session_ttl() -> u64 {
    86_400
}

fn default_sweep_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str("[bot]\nowner_id = \"1\"\n").unwrap();
        assert_eq!(config.bot.default_prefix, "!");
        assert_eq!(config.sessions.ttl_secs, 86_400);
        assert_eq!(config.sessions.sweep_interval_secs, 300);
        assert_eq!(config.http.listen, "127.0.0.1:8080");
        assert!(config.http.bridge_token.is_none());
        assert!(config.socket.is_none());
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
            [bot]
            owner_id = "42"
            default_prefix = "?"

            [database]
            path = "/tmp/x.redb"

            [http]
            listen = "0.0.0.0:9000"
            bridge_token = "tok"
            client_version = "1.2.0"

            [socket]
            listen = "0.0.0.0:9001"

            [lookup]
            content_url = "http://localhost/search"
            timeout_secs = 3

            [identity]
            client_id = "cid"
            access_token = "at"

            [sessions]
            ttl_secs = 60

            [log]
            format = "json"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.bot.default_prefix, "?");
        assert_eq!(config.http.bridge_token.as_deref(), Some("tok"));
        assert_eq!(config.socket.unwrap().listen, "0.0.0.0:9001");
        assert_eq!(config.lookup.timeout_secs, 3);
        assert_eq!(config.identity.helix_url, "https://api.twitch.tv/helix");
        assert_eq!(config.sessions.ttl_secs, 60);
        assert_eq!(config.sessions.sweep_interval_secs, 300);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn missing_bot_section_fails() {
        assert!(toml::from_str::<Config>("[database]\npath = \"x\"\n").is_err());
    }
}
