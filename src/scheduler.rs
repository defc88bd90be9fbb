//! # Scheduler Module
//!
//! Implements the shared task queue the worker pool draws from, including
//! the termination policy that decides when a crawl is finished.
//!
//! ## Overview
//!
//! The scheduler is the coordination point between concurrent producers
//! and consumers: workers both take tasks out and put newly discovered
//! follow-up tasks back in. It comes in two modes:
//!
//! - **Continuous**: `dequeue` suspends on an empty queue until a task
//!   arrives or [`Scheduler::stop`] is called. The crawl never ends on its
//!   own.
//! - **Drain**: `dequeue` reports [`DequeueOutcome::Quiescent`] once no
//!   task is waiting *and* no task is in flight. Because an in-flight task
//!   can still enqueue follow-ups, both counts must be zero before any
//!   worker is told the crawl is over.
//!
//! ## Quiescence Tracking
//!
//! `dequeue` claims an in-flight slot *before* popping, so there is no
//! window in which a task has left the queue but is not yet counted as in
//! flight — a concurrent dequeuer can never observe premature quiescence
//! while another worker is about to enqueue discovered links. Workers
//! must call [`Scheduler::complete`] exactly once per dequeued task,
//! after any follow-up enqueues; a worker that fails to do so keeps the
//! queue non-quiescent forever.
//!
//! Waiters are woken through a [`Notify`] on every enqueue, completion,
//! and stop, with the configured poll interval as a fallback re-check
//! tick.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use crossbeam::queue::SegQueue;
use tokio::sync::Notify;
use tracing::trace;

use crate::task::Task;

/// Termination policy of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerMode {
    /// Finish once the queue reaches and sustains quiescence.
    #[default]
    Drain,
    /// Run until explicitly stopped, ignoring quiescence.
    Continuous,
}

/// Result of one dequeue attempt.
#[derive(Debug)]
pub enum DequeueOutcome {
    /// A task, already counted as in flight. The caller owes one
    /// [`Scheduler::complete`] call for it.
    Task(Task),
    /// Drain mode only: nothing waiting and nothing in flight. Terminal.
    Quiescent,
    /// The scheduler was stopped. Terminal.
    Stopped,
}

/// Shared task queue contract.
///
/// The in-memory implementation below is the single-process core; a
/// broker-backed queue can be substituted behind this trait without
/// touching the worker pool.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Adds a task. Always succeeds; safe from any worker or the engine.
    fn enqueue(&self, task: Task);

    /// Takes the next task, suspending according to the scheduler's mode.
    async fn dequeue(&self) -> DequeueOutcome;

    /// Marks one previously dequeued task as fully processed. Must be
    /// called exactly once per dequeued task, after follow-up enqueues.
    fn complete(&self);

    /// Unblocks all dequeuers with [`DequeueOutcome::Stopped`].
    fn stop(&self);

    /// Number of tasks waiting in the queue.
    fn waiting(&self) -> usize;

    /// Number of tasks currently being processed.
    fn in_flight(&self) -> usize;

    /// True when nothing is waiting and nothing is in flight.
    fn is_quiescent(&self) -> bool {
        self.waiting() == 0 && self.in_flight() == 0
    }
}

/// In-memory scheduler over a lock-free queue.
pub struct MemoryScheduler {
    pending: SegQueue<Task>,
    waiting: AtomicUsize,
    in_flight: AtomicUsize,
    stopped: AtomicBool,
    mode: SchedulerMode,
    notify: Notify,
    poll_interval: Duration,
}

impl MemoryScheduler {
    pub fn new(mode: SchedulerMode, poll_interval: Duration) -> Self {
        MemoryScheduler {
            pending: SegQueue::new(),
            waiting: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            mode,
            notify: Notify::new(),
            poll_interval,
        }
    }

    /// Drain-to-completion scheduler with a default poll interval.
    pub fn drain() -> Self {
        MemoryScheduler::new(SchedulerMode::Drain, Duration::from_millis(100))
    }

    /// Continuous scheduler with a default poll interval.
    pub fn continuous() -> Self {
        MemoryScheduler::new(SchedulerMode::Continuous, Duration::from_millis(100))
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }
}

#[async_trait]
impl Scheduler for MemoryScheduler {
    fn enqueue(&self, task: Task) {
        trace!("enqueueing task: {}", task);
        // Count before pushing so a concurrent pop can never see the task
        // without its waiting increment.
        self.waiting.fetch_add(1, Ordering::SeqCst);
        self.pending.push(task);
        self.notify.notify_waiters();
    }

    async fn dequeue(&self) -> DequeueOutcome {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return DequeueOutcome::Stopped;
            }

            // Claim the in-flight slot first: between pop and complete the
            // task must already be counted, or a concurrent dequeuer could
            // observe premature quiescence.
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if let Some(task) = self.pending.pop() {
                self.waiting.fetch_sub(1, Ordering::SeqCst);
                trace!("dequeued task: {}", task);
                return DequeueOutcome::Task(task);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.mode == SchedulerMode::Drain && self.is_quiescent() {
                // Cascade the wakeup so every other blocked dequeuer also
                // re-evaluates quiescence promptly.
                self.notify.notify_waiters();
                return DequeueOutcome::Quiescent;
            }

            // Wait for an enqueue, a completion, or a stop; the poll tick
            // bounds how long a lost wakeup can stall us.
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
