//! Fetch collaborator boundary.
//!
//! The engine never performs network I/O itself; it hands each task (and
//! the proxy/mobile profile selected for it) to a [`Fetcher`]
//! implementation supplied at build time. Any non-success outcome is a
//! [`FetchError`] and subject to the task's retry budget.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::proxy::FetchProfile;
use crate::task::Task;

/// A raw response handed back by the fetch collaborator.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Target the response was fetched from.
    pub target: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(target: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        FetchResponse {
            target: target.into(),
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Lossy UTF-8 view of the body.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Performs the actual fetch for a task.
///
/// Implementations must be safe to call concurrently from every worker in
/// the pool. Per-request timeouts are the implementation's responsibility;
/// the engine only reacts to the returned result.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the task's target, applying the given profile if any.
    async fn fetch(&self, task: &Task, profile: &FetchProfile)
        -> Result<FetchResponse, FetchError>;

    /// Releases any held resources (connection pools, browser handles).
    /// Called once by the engine during teardown.
    async fn close(&self) {}
}
