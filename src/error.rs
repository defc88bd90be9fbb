//! Error types for the crawl engine.
//!
//! The taxonomy mirrors the failure stages of a crawl: configuration
//! problems abort startup, fetch failures are retried up to the task's
//! budget, parse and emit failures are terminal for the task or record
//! they concern but never for the worker that hit them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the engine itself (construction and lifecycle).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine was configured inconsistently or is missing a required
    /// collaborator. Raised at build/start time, never during a crawl.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The start-task list exists but could not be read or parsed.
    /// An absent file is not an error.
    #[error("failed to load start list {path:?}: {message}")]
    StartList { path: PathBuf, message: String },

    /// A lifecycle wait was interrupted; shutdown proceeds anyway.
    #[error("interrupted while waiting: {0}")]
    Interrupted(String),
}

/// A failed fetch attempt. Recoverable: the task is re-enqueued until its
/// retry budget is exhausted.
#[derive(Error, Debug)]
#[error("fetch of {target} failed: {message}")]
pub struct FetchError {
    /// Target the fetch was addressed to.
    pub target: String,
    /// Collaborator-supplied description of the failure.
    pub message: String,
    /// HTTP status, when the failure produced one.
    pub status: Option<u16>,
}

impl FetchError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError {
            target: target.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// A rule provider failed to extract anything from a response. Terminal
/// for the task; never retried.
#[derive(Error, Debug)]
#[error("parse failed: {0}")]
pub struct ParseError(pub String);

/// The output sink rejected a record. Terminal for the record; does not
/// affect the task that produced it.
#[derive(Error, Debug)]
#[error("emit failed: {0}")]
pub struct EmitError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display_includes_target() {
        let err = FetchError::new("https://example.com/a", "connection reset").with_status(502);
        let text = err.to_string();
        assert!(text.contains("https://example.com/a"));
        assert!(text.contains("connection reset"));
        assert_eq!(err.status, Some(502));
    }
}
