//! Integration test common infrastructure.
//!
//! Builds a full [`App`] over a temporary database with in-process fakes for
//! the content and identity services, and drives it like the chat bridge
//! does.

#![allow(dead_code)]

use async_trait::async_trait;
use slreq::config::Config;
use slreq::db::{ChatUser, Database};
use slreq::gateway::SocketGateway;
use slreq::handlers::{ChatMessage, Registry, Reply};
use slreq::http::{HttpState, router};
use slreq::services::{ContentLookup, ContentRecord, IdentityLookup, LookupError, RoleFlags};
use slreq::state::{App, Collaborators};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

pub const CHANNEL_ID: &str = "100";
pub const CHANNEL_NAME: &str = "streamer";
pub const OWNER_ID: &str = "owner";
pub const BRIDGE_TOKEN: &str = "bridge-token";

const BASE_CONFIG: &str = r#"
[bot]
owner_id = "owner"

[http]
bridge_token = "bridge-token"
"#;

/// Numeric queries resolve to a level, `fail` errors, anything else is unknown.
pub struct FakeContent;

#[async_trait]
impl ContentLookup for FakeContent {
    async fn resolve(&self, query: &str) -> Result<Option<ContentRecord>, LookupError> {
        if query == "fail" {
            return Err(LookupError::Status(503));
        }
        Ok(query.parse::<u64>().ok().map(|id| ContentRecord {
            id: id.to_string(),
            name: format!("Level {id}"),
            creator_name: "creator".to_string(),
        }))
    }
}

/// Every handle exists except `ghost`.
pub struct FakeIdentity;

#[async_trait]
impl IdentityLookup for FakeIdentity {
    async fn resolve(&self, handle: &str) -> Result<Option<ChatUser>, LookupError> {
        if handle == "ghost" {
            return Ok(None);
        }
        Ok(Some(viewer(handle)))
    }
}

/// A plain chat user with a deterministic id.
pub fn viewer(name: &str) -> ChatUser {
    ChatUser::new(format!("id-{name}"), name)
}

pub fn streamer() -> ChatUser {
    ChatUser::new(CHANNEL_ID, CHANNEL_NAME)
}

pub fn owner() -> ChatUser {
    ChatUser::new(OWNER_ID, "dev")
}

pub fn moderator_flags() -> RoleFlags {
    RoleFlags {
        moderator: true,
        ..Default::default()
    }
}

pub struct TestApp {
    pub app: Arc<App>,
    pub registry: Arc<Registry>,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(BASE_CONFIG)
    }

    pub fn with_config(raw: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config: Config = toml::from_str(raw).expect("test config");
        let db = Database::open(dir.path().join("test.redb")).expect("open database");
        let collaborators = Collaborators {
            content: Arc::new(FakeContent),
            identity: Arc::new(FakeIdentity),
        };
        Self {
            app: Arc::new(App::new(config, db, collaborators)),
            registry: Arc::new(Registry::new()),
            _dir: dir,
        }
    }

    pub fn message(user: &ChatUser, flags: RoleFlags, text: &str) -> ChatMessage {
        ChatMessage {
            channel_id: CHANNEL_ID.to_string(),
            channel_name: CHANNEL_NAME.to_string(),
            user: user.clone(),
            flags,
            text: text.to_string(),
        }
    }

    /// Send `text` as `user` with no role flags.
    pub async fn say(&self, user: &ChatUser, text: &str) -> Option<Reply> {
        self.say_with(user, RoleFlags::default(), text).await
    }

    pub async fn say_with(&self, user: &ChatUser, flags: RoleFlags, text: &str) -> Option<Reply> {
        let msg = Self::message(user, flags, text);
        self.registry.dispatch(&self.app, &msg).await
    }

    /// Send a known command and unwrap the reply.
    pub async fn run(&self, user: &ChatUser, text: &str) -> Reply {
        self.say(user, text).await.expect("command should be recognized")
    }

    pub async fn run_as_mod(&self, user: &ChatUser, text: &str) -> Reply {
        self.say_with(user, moderator_flags(), text)
            .await
            .expect("command should be recognized")
    }

    /// Enable requests as the streamer, consuming the onboarding hint.
    pub async fn open(&self) {
        let reply = self.run(&streamer(), "!toggle").await;
        assert!(reply.message.starts_with("Requests are now enabled."));
    }

    /// Serve the HTTP API on an ephemeral port.
    pub async fn serve_http(&self) -> SocketAddr {
        let state = HttpState {
            app: Arc::clone(&self.app),
            registry: Arc::clone(&self.registry),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind http");
        let addr = listener.local_addr().expect("http addr");
        tokio::spawn(async move { axum::serve(listener, router(state)).await });
        addr
    }

    /// Serve the dashboard socket on an ephemeral port.
    pub async fn serve_socket(&self) -> SocketAddr {
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("socket addr");
        let gateway = SocketGateway::bind(addr, Arc::clone(&self.app.sessions))
            .await
            .expect("bind socket");
        let addr = gateway.local_addr().expect("socket addr");
        tokio::spawn(gateway.run());
        addr
    }
}
