//! External lookup collaborators.
//!
//! - [`ContentLookup`]: resolves a request query to a content record
//! - [`IdentityLookup`]: resolves a chat handle to a stable user id
//!
//! Both have HTTP implementations; timeouts are owned by the HTTP client.

use crate::config::{IdentityConfig, LookupConfig};
use crate::db::ChatUser;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A resolved piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: String,
    pub name: String,
    pub creator_name: String,
}

/// Lookup failures. "Not found" is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ContentLookup: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Option<ContentRecord>, LookupError>;
}

#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn resolve(&self, handle: &str) -> Result<Option<ChatUser>, LookupError>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, LookupError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("slreq/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

// ============================================================================
// Content lookup
// ============================================================================

/// Parse a colon-delimited level search response.
///
/// Format: `1:<id>:2:<name>:...#<creatorId>:<creatorName>:...`, with
/// multiple results separated by `|`. Only the first result is used.
/// A body of `-1` means no match.
pub fn parse_content_record(raw: &str) -> Result<Option<ContentRecord>, LookupError> {
    let raw = raw.trim();
    if raw == "-1" || raw.is_empty() {
        return Ok(None);
    }

    let mut sections = raw.split('#');
    let levels = sections.next().unwrap_or_default();
    let creators = sections
        .next()
        .ok_or_else(|| LookupError::Malformed("missing creator section".into()))?;

    let level = levels.split('|').next().unwrap_or_default();
    let fields: Vec<&str> = level.split(':').collect();
    let (id, name) = match (fields.get(1), fields.get(3)) {
        (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => (*id, *name),
        _ => return Err(LookupError::Malformed(format!("bad level record: {level}"))),
    };

    let creator = creators.split('|').next().unwrap_or_default();
    let creator_name = creator
        .split(':')
        .nth(1)
        .filter(|n| !n.is_empty())
        .unwrap_or("-");

    Ok(Some(ContentRecord {
        id: id.to_string(),
        name: name.to_string(),
        creator_name: creator_name.to_string(),
    }))
}

/// HTTP content lookup: `GET {url}?str=<query>`.
pub struct HttpContentLookup {
    url: String,
    client: reqwest::Client,
}

impl HttpContentLookup {
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(config: &LookupConfig) -> Result<Self, LookupError> {
        Ok(Self {
            url: config.content_url.clone(),
            client: http_client(Duration::from_secs(config.timeout_secs))?,
        })
    }
}

#[async_trait]
impl ContentLookup for HttpContentLookup {
    async fn resolve(&self, query: &str) -> Result<Option<ContentRecord>, LookupError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("str", query)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Content lookup returned error status");
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let record = parse_content_record(&body)?;
        debug!(query = %query, found = record.is_some(), "Content lookup");
        Ok(record)
    }
}

// ============================================================================
// Identity lookup
// ============================================================================

#[derive(Debug, Deserialize)]
struct HelixUsers {
    data: Vec<HelixUser>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
}

/// Helix users endpoint: `GET {helix_url}/users?login=<handle>`.
pub struct HelixIdentityLookup {
    config: IdentityConfig,
    client: reqwest::Client,
}

impl HelixIdentityLookup {
    pub fn new(config: &IdentityConfig) -> Result<Self, LookupError> {
        Ok(Self {
            config: config.clone(),
            client: http_client(Duration::from_secs(config.timeout_secs))?,
        })
    }
}

#[async_trait]
impl IdentityLookup for HelixIdentityLookup {
    async fn resolve(&self, handle: &str) -> Result<Option<ChatUser>, LookupError> {
        let url = format!("{}/users", self.config.helix_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("login", handle)])
            .bearer_auth(&self.config.access_token)
            .header("Client-Id", &self.config.client_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let users: HelixUsers = response.json().await?;
        Ok(users
            .data
            .into_iter()
            .next()
            .map(|u| ChatUser::new(u.id, u.login)))
    }
}

/// Strip `@` and surrounding whitespace from a handle and lowercase it.
pub fn normalize_handle(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '@' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}
