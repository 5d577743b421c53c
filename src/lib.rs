//! slreq - chat-operated, multi-tenant content request queue.
//!
//! Channels submit requests by content id; each channel's queue is gated by
//! its own settings, permission overrides and blacklists. Dashboards bind to
//! a channel identity through session secrets.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod services;
pub mod state;
pub mod telemetry;
