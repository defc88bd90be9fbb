//! # Rule Provider Module
//!
//! Defines the extraction boundary: the collaborator that turns a raw
//! response into at most one record and any follow-up tasks, and the
//! swappable slot the engine keeps it in so rules can be hot-reloaded.
//!
//! ## Hot reload
//!
//! Workers pin the active provider (an `Arc` clone out of the slot) once
//! per task, before the fetch starts, and never re-read it mid-task. The
//! engine only swaps the slot between `pause` and `restart`, so a reload
//! becomes visible to every worker on the next task it processes after
//! resuming — never in the middle of one.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::ParseError;
use crate::fetch::FetchResponse;
use crate::task::Task;

/// Output of one parse: zero or one extracted record plus any follow-up
/// tasks discovered in the response.
#[derive(Debug)]
pub struct ParseOutput<R> {
    record: Option<R>,
    tasks: Vec<Task>,
}

impl<R> ParseOutput<R> {
    pub fn new() -> Self {
        ParseOutput {
            record: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: R) -> Self {
        self.record = Some(record);
        self
    }

    pub fn push_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn into_parts(self) -> (Option<R>, Vec<Task>) {
        (self.record, self.tasks)
    }
}

impl<R> Default for ParseOutput<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a fetched response to extraction output.
///
/// Implementations shared across workers must be safe to call
/// concurrently. Errors here are terminal for the task: logged, dropped,
/// never retried.
#[async_trait]
pub trait RuleProvider: Send + Sync {
    /// The record type this provider extracts.
    type Record: Send;

    async fn parse(
        &self,
        response: &FetchResponse,
        task: &Task,
    ) -> Result<ParseOutput<Self::Record>, ParseError>;
}

/// Atomically swappable reference to the active rule provider.
///
/// Reads clone the inner `Arc`; writes replace it whole. A reader sees
/// either the old provider or the new one, never a partial state.
pub struct RuleSlot<R> {
    inner: Arc<RwLock<Arc<dyn RuleProvider<Record = R>>>>,
}

impl<R> RuleSlot<R> {
    pub fn new(provider: Arc<dyn RuleProvider<Record = R>>) -> Self {
        RuleSlot {
            inner: Arc::new(RwLock::new(provider)),
        }
    }

    /// Returns the provider active right now.
    pub fn current(&self) -> Arc<dyn RuleProvider<Record = R>> {
        self.inner.read().clone()
    }

    /// Replaces the active provider.
    pub fn store(&self, provider: Arc<dyn RuleProvider<Record = R>>) {
        *self.inner.write() = provider;
    }
}

impl<R> Clone for RuleSlot<R> {
    fn clone(&self) -> Self {
        RuleSlot {
            inner: Arc::clone(&self.inner),
        }
    }
}
