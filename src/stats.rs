//! # Statistics Module
//!
//! Collects counters describing the crawl's progress.
//!
//! ## Overview
//!
//! The `StatCollector` is shared between the engine and every worker and
//! updated with atomic operations only, so it never sits on the hot path
//! behind a lock. It doubles as the read-only engine state handed to the
//! registered [`EventListener`](crate::events::EventListener) at start and
//! stop — the monitoring hook. A failed or slow export on that side
//! cannot affect crawl correctness.
//!
//! ## Key Metrics Tracked
//!
//! - **Task metrics**: enqueued, dequeued, succeeded, retried, dropped
//! - **Failure metrics**: fetch failures and terminal drops keyed by stage
//! - **Record metrics**: emitted and dropped records
//! - **Timing**: elapsed crawl duration and task throughput

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

// A consistent snapshot of the counters, used for reporting.
#[derive(Debug, serde::Serialize)]
pub struct StatsSnapshot {
    pub tasks_enqueued: usize,
    pub tasks_dequeued: usize,
    pub tasks_succeeded: usize,
    pub tasks_retried: usize,
    pub tasks_dropped: usize,
    pub fetch_failures: usize,
    pub records_emitted: usize,
    pub records_dropped: usize,
    pub drop_stages: HashMap<String, usize>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl StatsSnapshot {
    pub fn tasks_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.tasks_succeeded as f64 / secs
        } else {
            0.0
        }
    }
}

/// Collects and stores counters about the engine's operation.
#[derive(Debug, serde::Serialize)]
pub struct StatCollector {
    #[serde(skip)]
    start_time: Instant,

    pub tasks_enqueued: AtomicUsize,
    pub tasks_dequeued: AtomicUsize,
    pub tasks_succeeded: AtomicUsize,
    pub tasks_retried: AtomicUsize,
    pub tasks_dropped: AtomicUsize,
    pub fetch_failures: AtomicUsize,

    pub records_emitted: AtomicUsize,
    pub records_dropped: AtomicUsize,

    /// Terminal drops keyed by the stage that caused them ("fetch",
    /// "parse").
    pub drop_stages: Arc<dashmap::DashMap<String, usize>>,
}

impl StatCollector {
    pub(crate) fn new() -> Self {
        StatCollector {
            start_time: Instant::now(),
            tasks_enqueued: AtomicUsize::new(0),
            tasks_dequeued: AtomicUsize::new(0),
            tasks_succeeded: AtomicUsize::new(0),
            tasks_retried: AtomicUsize::new(0),
            tasks_dropped: AtomicUsize::new(0),
            fetch_failures: AtomicUsize::new(0),
            records_emitted: AtomicUsize::new(0),
            records_dropped: AtomicUsize::new(0),
            drop_stages: Arc::new(dashmap::DashMap::new()),
        }
    }

    /// Instant the engine started.
    pub fn started_at(&self) -> Instant {
        self.start_time
    }

    /// Creates a consistent snapshot of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut drop_stages = HashMap::new();
        for entry in self.drop_stages.iter() {
            let (stage, count) = entry.pair();
            drop_stages.insert(stage.clone(), *count);
        }

        StatsSnapshot {
            tasks_enqueued: self.tasks_enqueued.load(Ordering::SeqCst),
            tasks_dequeued: self.tasks_dequeued.load(Ordering::SeqCst),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::SeqCst),
            tasks_retried: self.tasks_retried.load(Ordering::SeqCst),
            tasks_dropped: self.tasks_dropped.load(Ordering::SeqCst),
            fetch_failures: self.fetch_failures.load(Ordering::SeqCst),
            records_emitted: self.records_emitted.load(Ordering::SeqCst),
            records_dropped: self.records_dropped.load(Ordering::SeqCst),
            drop_stages,
            elapsed: self.start_time.elapsed(),
        }
    }

    pub(crate) fn increment_tasks_enqueued(&self) {
        self.tasks_enqueued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_tasks_dequeued(&self) {
        self.tasks_dequeued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_tasks_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_tasks_retried(&self) {
        self.tasks_retried.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_records_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_records_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a terminal task drop at the given stage.
    pub(crate) fn record_drop(&self, stage: &str) {
        self.tasks_dropped.fetch_add(1, Ordering::SeqCst);
        *self.drop_stages.entry(stage.to_string()).or_insert(0) += 1;
    }

    /// Serializes the counters to a JSON string.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();

        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "  duration : {:?}", snapshot.elapsed)?;
        writeln!(f, "  speed    : {:.2} task/s", snapshot.tasks_per_second())?;
        writeln!(
            f,
            "  tasks    : enqueued: {}, dequeued: {}, ok: {}, retry: {}, drop: {}",
            snapshot.tasks_enqueued,
            snapshot.tasks_dequeued,
            snapshot.tasks_succeeded,
            snapshot.tasks_retried,
            snapshot.tasks_dropped
        )?;
        writeln!(
            f,
            "  records  : emitted: {}, dropped: {}",
            snapshot.records_emitted, snapshot.records_dropped
        )?;

        let stages = if snapshot.drop_stages.is_empty() {
            "none".to_string()
        } else {
            snapshot
                .drop_stages
                .iter()
                .map(|(stage, count)| format!("{stage}: {count}"))
                .collect::<Vec<String>>()
                .join(", ")
        };
        writeln!(f, "  failures : {}\n", stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counter_updates() {
        let stats = StatCollector::new();
        stats.increment_tasks_enqueued();
        stats.increment_tasks_enqueued();
        stats.increment_tasks_dequeued();
        stats.increment_tasks_succeeded();
        stats.record_drop("fetch");
        stats.record_drop("fetch");
        stats.record_drop("parse");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tasks_enqueued, 2);
        assert_eq!(snapshot.tasks_dequeued, 1);
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.tasks_dropped, 3);
        assert_eq!(snapshot.drop_stages.get("fetch"), Some(&2));
        assert_eq!(snapshot.drop_stages.get("parse"), Some(&1));
    }

    #[test]
    fn display_and_json_never_fail() {
        let stats = StatCollector::new();
        stats.increment_records_emitted();
        let text = stats.to_string();
        assert!(text.contains("Crawl Statistics"));
        assert!(stats.to_json_string().is_ok());
    }
}
