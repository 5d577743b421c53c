//! Chat command handlers.
//!
//! The chat bridge delivers a [`ChatMessage`]; [`Registry::dispatch`] turns it
//! into a [`Reply`] carrying a result code and the text to send back.

mod blacklist;
mod context;
mod misc;
mod queue;
mod registry;
mod settings;

pub use context::{ChatMessage, Context, Handler, Reply};
pub use registry::{Command, CommandSpec, Registry};
