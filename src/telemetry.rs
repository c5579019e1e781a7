//! Telemetry utilities for command timing and invocation correlation.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors for dispatch observability.
pub mod spans {
    use tracing::{Span, field, info_span};

    /// Create a span for one invocation. The `command` field is filled in
    /// once resolution succeeds.
    pub fn command(invocation: &uuid::Uuid, author: u64, scope: &str) -> Span {
        info_span!(
            "command",
            command = field::Empty,
            invocation = %invocation,
            author = author,
            scope = %scope,
        )
    }
}
