//! Error taxonomy for the banditbench library.
//!
//! Every fallible operation in the crate returns [`BenchError`]. The variants
//! mirror the failure scopes of the engine:
//!
//! - [`BenchError::Config`] — malformed benchmark JSON, unknown simulation
//!   type, missing required fields. Fatal at the run level.
//! - [`BenchError::Environment`] — remote fetch failed, dataset deactivated,
//!   checksum mismatch, unparseable row. Scoped to one environment.
//! - [`BenchError::Learner`] — a failing `choose`/`learn` call or an invalid
//!   action index. Scoped to one (environment, learner) pair.
//! - [`BenchError::Cache`] — corrupt gzip data or IO failure in a cacher.
//! - [`BenchError::Worker`] — a worker thread died unexpectedly.
//! - [`BenchError::Cancelled`] — the run was interrupted cooperatively.
//!
//! Serialized with an internally-tagged `"type"` discriminator field so that
//! JSON consumers can switch on `error.type` without a wrapper object.

use serde::{Deserialize, Serialize};

/// Structured error variants produced by the benchmarking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BenchError {
    /// The benchmark configuration could not be understood.
    Config {
        /// Human-readable description of the configuration problem.
        message: String,
    },

    /// An environment failed to produce its interactions.
    Environment {
        /// Human-readable description of the environment failure.
        message: String,
    },

    /// A learner failed while choosing or learning.
    Learner {
        /// Human-readable description of the learner failure.
        message: String,
    },

    /// A cacher failed to read or write an entry.
    Cache {
        /// Human-readable description of the cache failure.
        message: String,
    },

    /// A worker thread terminated abnormally.
    Worker {
        /// Human-readable description of the worker failure.
        message: String,
    },

    /// The run was interrupted by a cooperative cancellation request.
    Cancelled,
}

impl BenchError {
    /// Shorthand constructor for [`BenchError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Config { message: message.into() }
    }

    /// Shorthand constructor for [`BenchError::Environment`].
    pub fn environment(message: impl Into<String>) -> Self {
        BenchError::Environment { message: message.into() }
    }

    /// Shorthand constructor for [`BenchError::Learner`].
    pub fn learner(message: impl Into<String>) -> Self {
        BenchError::Learner { message: message.into() }
    }

    /// Shorthand constructor for [`BenchError::Cache`].
    pub fn cache(message: impl Into<String>) -> Self {
        BenchError::Cache { message: message.into() }
    }

    /// Shorthand constructor for [`BenchError::Worker`].
    pub fn worker(message: impl Into<String>) -> Self {
        BenchError::Worker { message: message.into() }
    }

    /// The structured tag used when the error is written to a log sink.
    ///
    /// Each failure produces exactly one log line of the form
    /// `[<tag>] <message>`.
    pub fn tag(&self) -> &'static str {
        match self {
            BenchError::Config { .. } => "config",
            BenchError::Environment { .. } => "environment",
            BenchError::Learner { .. } => "learner",
            BenchError::Cache { .. } => "cache",
            BenchError::Worker { .. } => "worker",
            BenchError::Cancelled => "cancel",
        }
    }

    /// The single log line this error contributes to the run log.
    pub fn log_line(&self) -> String {
        format!("[{}] {}", self.tag(), self)
    }
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchError::Config { message }
            | BenchError::Environment { message }
            | BenchError::Learner { message }
            | BenchError::Cache { message }
            | BenchError::Worker { message } => f.write_str(message),
            BenchError::Cancelled => f.write_str("run cancelled"),
        }
    }
}

impl std::error::Error for BenchError {}

/// Convenience alias used throughout the crate.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ── Tags and log lines ───────────────────────────────────────────────────

    #[test]
    fn test_tag_per_variant() {
        assert_eq!(BenchError::config("x").tag(), "config");
        assert_eq!(BenchError::environment("x").tag(), "environment");
        assert_eq!(BenchError::learner("x").tag(), "learner");
        assert_eq!(BenchError::cache("x").tag(), "cache");
        assert_eq!(BenchError::worker("x").tag(), "worker");
        assert_eq!(BenchError::Cancelled.tag(), "cancel");
    }

    #[test]
    fn test_log_line_has_tag_and_message() {
        let line = BenchError::environment("dataset 42 deactivated").log_line();
        assert_eq!(line, "[environment] dataset 42 deactivated");
    }

    // ── Serde round-trips ────────────────────────────────────────────────────

    #[test]
    fn test_environment_error_round_trip() {
        let error = BenchError::environment("md5 mismatch");
        let json = serde_json::to_string(&error).expect("serialize Environment");
        assert!(
            json.contains(r#""type":"Environment""#),
            "JSON should contain type discriminator: {json}"
        );
        assert!(json.contains(r#""message":"md5 mismatch""#));
        let back: BenchError = serde_json::from_str(&json).expect("deserialize Environment");
        assert_eq!(back, error);
    }

    #[test]
    fn test_cancelled_round_trip() {
        let error = BenchError::Cancelled;
        let json = serde_json::to_string(&error).expect("serialize Cancelled");
        assert!(
            json.contains(r#""type":"Cancelled""#),
            "JSON should contain type discriminator: {json}"
        );
        let back: BenchError = serde_json::from_str(&json).expect("deserialize Cancelled");
        assert_eq!(back, error);
    }

    #[test]
    fn test_display_is_bare_message() {
        let error = BenchError::learner("choose returned index 7 of 3");
        assert_eq!(error.to_string(), "choose returned index 7 of 3");
    }
}
