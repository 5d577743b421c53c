//! Telemetry utilities for command timing.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: &'static str,
    start: Instant,
}

impl CommandTimer {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(self.command, duration);
    }
}

/// Span constructors shared by the dispatcher and the socket.
pub mod spans {
    use tracing::{Span, info_span};

    pub fn command(name: &str, channel: &str, user: &str) -> Span {
        info_span!("command", name = %name, channel = %channel, user = %user)
    }

    pub fn socket(peer: &str) -> Span {
        info_span!("socket", peer = %peer)
    }
}
