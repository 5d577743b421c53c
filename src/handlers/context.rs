//! Handler context and shared types.

use crate::db::ChatUser;
use crate::error::ResCode;
use crate::handlers::Registry;
use crate::services::{Rank, RoleFlags};
use crate::state::App;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One chat message as delivered by the chat bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub channel_id: String,
    pub channel_name: String,
    pub user: ChatUser,
    #[serde(default)]
    pub flags: RoleFlags,
    pub text: String,
}

/// Result of a command: a code plus text for the bridge to send back.
///
/// An empty message means "say nothing". When `targets` is set the bridge
/// sends the message to those channels instead of the originating one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub code: ResCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

impl Reply {
    pub fn new(code: ResCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            targets: Vec::new(),
        }
    }

    /// Address the reply to other channels by name.
    pub fn addressed_to(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(ResCode::Ok, message)
    }

    pub fn silent(code: ResCode) -> Self {
        Self::new(code, String::new())
    }

    /// Generic reply for operational failures. Details stay in the logs.
    pub fn error() -> Self {
        Self::new(
            ResCode::Error,
            "An error occurred. If the issue persists, please contact the developer.",
        )
    }

    pub fn is_silent(&self) -> bool {
        self.message.is_empty()
    }
}

/// Everything a handler may touch for one invocation.
pub struct Context<'a> {
    pub app: &'a App,
    pub registry: &'a Registry,
    pub msg: &'a ChatMessage,
    pub rank: Rank,
    /// Prefix in effect for this channel.
    pub prefix: String,
    /// The command runs in privilege mode.
    pub privileged: bool,
}

impl Context<'_> {
    #[inline]
    pub fn channel_id(&self) -> &str {
        &self.msg.channel_id
    }

    #[inline]
    pub fn user(&self) -> &ChatUser {
        &self.msg.user
    }
}

/// A chat command implementation.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, args: &[String]) -> Reply;
}
