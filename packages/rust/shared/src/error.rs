//! Error types for Prospector.
//!
//! Library crates use [`ProspectorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::Stage;

/// Top-level error type for all Prospector operations.
#[derive(Debug, thiserror::Error)]
pub enum ProspectorError {
    /// Configuration loading or validation error (including missing credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// Data validation error (malformed run config, bad data point, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Discovery stage failure. Fatal: without the primary page there is
    /// nothing to enrich, so the whole run aborts.
    #[error("discovery failed for {url}: {message}")]
    Discovery { url: String, message: String },

    /// A non-discovery stage failed. Caught at the flow level and degraded
    /// to a zero-contribution stage; surfaced here only at the agent boundary.
    #[error("{stage} stage error: {message}")]
    Agent { stage: Stage, message: String },

    /// Database or resume-store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Store write contention that outlasted the bounded retry loop. The
    /// write path retries "locked/busy" errors with backoff and returns this
    /// variant once the attempt cap is exhausted.
    #[error("store busy: {0}")]
    StoreBusy(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProspectorError>;

impl ProspectorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a fatal discovery error for the given target URL.
    pub fn discovery(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Discovery {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a stage-level agent error.
    pub fn agent(stage: Stage, msg: impl Into<String>) -> Self {
        Self::Agent {
            stage,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is transient store contention worth retrying.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::StoreBusy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProspectorError::config("missing FIRECRAWL_API_KEY");
        assert_eq!(err.to_string(), "config error: missing FIRECRAWL_API_KEY");

        let err = ProspectorError::discovery("https://acme.example", "HTTP 503");
        assert!(err.to_string().contains("https://acme.example"));
        assert!(err.to_string().contains("HTTP 503"));

        let err = ProspectorError::agent(Stage::Profile, "timed out");
        assert_eq!(err.to_string(), "profile stage error: timed out");
    }

    #[test]
    fn busy_classification() {
        assert!(ProspectorError::StoreBusy("database is locked".into()).is_busy());
        assert!(!ProspectorError::Storage("disk full".into()).is_busy());
    }
}
