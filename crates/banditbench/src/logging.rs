//! Log sink interface used by the benchmark loop and runner.
//!
//! The engine never writes to stdout or a file directly; every diagnostic
//! flows through a [`Logger`] sink. Each failure from the error taxonomy
//! produces exactly one line with a structured `[tag]` prefix (see
//! [`crate::error::BenchError::log_line`]).
//!
//! Shipped sinks:
//! - [`NullLogger`] — drops everything.
//! - [`MemoryLogger`] — captures lines behind a mutex, for tests.
//! - [`StdLogger`] — forwards to the `log` crate facade, so the host binary
//!   decides the backend (the CLI installs `env_logger`).

use std::sync::Mutex;

/// An append-only sink for one-line log records.
///
/// Implementations must be cheap to call and safe to share across worker
/// threads.
pub trait Logger: Send + Sync {
    /// Append one line to the sink.
    fn log(&self, line: &str);
}

/// A logger which drops all lines.
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _line: &str) {}
}

/// A logger which captures lines in memory.
///
/// Primarily useful for asserting on failure tags in tests.
#[derive(Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    /// Create an empty in-memory logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of all lines logged so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("MemoryLogger mutex poisoned").clone()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, line: &str) {
        self.lines
            .lock()
            .expect("MemoryLogger mutex poisoned")
            .push(line.to_string());
    }
}

/// A logger which forwards through the `log` crate facade.
///
/// Lines carrying a failure tag (`[environment]`, `[learner]`, `[cache]`,
/// `[worker]`, `[config]`) are emitted at `warn` level; everything else at
/// `info`.
pub struct StdLogger;

impl Logger for StdLogger {
    fn log(&self, line: &str) {
        let is_failure = ["[environment]", "[learner]", "[cache]", "[worker]", "[config]"]
            .iter()
            .any(|tag| line.starts_with(tag));
        if is_failure {
            log::warn!("{line}");
        } else {
            log::info!("{line}");
        }
    }
}
