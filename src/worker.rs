//! # Worker Module
//!
//! Implements the pull → fetch → parse → emit → requeue loop that each
//! pool slot runs.
//!
//! ## Cooperative Control
//!
//! Pause, resume, and stop requests arrive over a watch channel and are
//! honored only between task iterations — an in-flight fetch/parse/emit
//! always completes first. A pause that lands while the worker is blocked
//! waiting for a task takes effect before the dequeued task enters the
//! fetch stage, so nothing is fetched during a pause and nothing is lost
//! or duplicated across a pause/restart cycle.
//!
//! ## Completion Accounting
//!
//! Every dequeued task is balanced by exactly one `complete()` call on
//! the scheduler, issued after follow-up tasks have been enqueued; the
//! worker signals the engine's completion barrier exactly once, when its
//! loop exits.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::engine::CompletionBarrier;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::proxy::{FetchProfile, ProxySelector};
use crate::rule::RuleSlot;
use crate::scheduler::{DequeueOutcome, Scheduler};
use crate::stats::StatCollector;
use crate::task::Task;

/// Run state broadcast from the engine to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

pub(crate) struct Worker<R: Send + 'static> {
    id: usize,
    scheduler: Arc<dyn Scheduler>,
    rules: RuleSlot<R>,
    fetcher: Arc<dyn Fetcher>,
    pipeline: Arc<dyn Pipeline<R>>,
    proxies: Arc<dyn ProxySelector>,
    control: watch::Receiver<RunState>,
    stats: Arc<StatCollector>,
    barrier: Arc<CompletionBarrier>,
    max_retries: u32,
    proxy_enabled: bool,
    mobile: bool,
}

impl<R: Send + 'static> Worker<R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        scheduler: Arc<dyn Scheduler>,
        rules: RuleSlot<R>,
        fetcher: Arc<dyn Fetcher>,
        pipeline: Arc<dyn Pipeline<R>>,
        proxies: Arc<dyn ProxySelector>,
        control: watch::Receiver<RunState>,
        stats: Arc<StatCollector>,
        barrier: Arc<CompletionBarrier>,
        max_retries: u32,
        proxy_enabled: bool,
        mobile: bool,
    ) -> Self {
        Worker {
            id,
            scheduler,
            rules,
            fetcher,
            pipeline,
            proxies,
            control,
            stats,
            barrier,
            max_retries,
            proxy_enabled,
            mobile,
        }
    }

    /// The worker loop. Runs until the scheduler reports quiescence
    /// (drain mode) or a stop is observed, then signals the completion
    /// barrier exactly once.
    pub(crate) async fn run(mut self) {
        debug!("worker {} started", self.id);
        loop {
            if self.wait_for_running().await == RunState::Stopped {
                debug!("worker {} observed stop, exiting", self.id);
                break;
            }

            match self.scheduler.dequeue().await {
                DequeueOutcome::Task(task) => {
                    // A pause may have arrived while we were blocked in
                    // dequeue; honor it before the task enters fetch. On a
                    // stop, the already-claimed task still finishes.
                    self.wait_for_running().await;
                    self.process(task).await;
                }
                DequeueOutcome::Quiescent => {
                    debug!("worker {} sees quiescent queue, exiting", self.id);
                    break;
                }
                DequeueOutcome::Stopped => {
                    debug!("worker {} observed stop, exiting", self.id);
                    break;
                }
            }
        }

        self.barrier.arrive();
        debug!("worker {} finished", self.id);
    }

    /// Suspends while paused. Returns the state that ended the wait; a
    /// closed control channel counts as a stop request.
    async fn wait_for_running(&mut self) -> RunState {
        if *self.control.borrow() != RunState::Paused {
            return *self.control.borrow();
        }

        debug!("worker {} paused", self.id);
        match self.control.wait_for(|state| *state != RunState::Paused).await {
            Ok(state) => {
                let state = *state;
                if state == RunState::Running {
                    debug!("worker {} resumed", self.id);
                }
                state
            }
            Err(_) => {
                warn!("worker {} control channel closed, shutting down", self.id);
                RunState::Stopped
            }
        }
    }

    /// Runs one task through fetch, parse, and emit, then balances the
    /// scheduler's in-flight count.
    async fn process(&self, task: Task) {
        self.stats.increment_tasks_dequeued();

        // Pin the active rule provider for the whole task; a hot reload
        // becomes visible only at the next iteration.
        let rules = self.rules.current();

        let proxy = if self.proxy_enabled && task.use_proxy() {
            self.proxies.select(&task)
        } else {
            None
        };
        let profile = FetchProfile {
            proxy,
            mobile: self.mobile,
        };

        match self.fetcher.fetch(&task, &profile).await {
            Ok(response) => match rules.parse(&response, &task).await {
                Ok(output) => {
                    let (record, followups) = output.into_parts();
                    // Follow-ups go in before complete() so the queue can
                    // never look quiescent while they are still pending.
                    for followup in followups {
                        self.scheduler.enqueue(followup);
                        self.stats.increment_tasks_enqueued();
                    }
                    if let Some(record) = record {
                        if let Err(e) = self.pipeline.emit(record).await {
                            error!(
                                "record from {} dropped by {}: {}",
                                task.target(),
                                self.pipeline.name(),
                                e
                            );
                            self.stats.increment_records_dropped();
                        } else {
                            self.stats.increment_records_emitted();
                        }
                    }
                    self.stats.increment_tasks_succeeded();
                }
                Err(e) => {
                    error!(
                        "task {} dropped at parse stage (retries: {}): {}",
                        task.target(),
                        task.retries(),
                        e
                    );
                    self.stats.record_drop("parse");
                }
            },
            Err(e) => {
                self.stats.increment_fetch_failures();
                if task.retries() < self.max_retries {
                    warn!(
                        "fetch of {} failed (attempt {}), re-enqueueing: {}",
                        task.target(),
                        task.retries() + 1,
                        e
                    );
                    self.stats.increment_tasks_retried();
                    self.scheduler.enqueue(task.into_retry());
                } else {
                    error!(
                        "task {} dropped at fetch stage after {} retries: {}",
                        task.target(),
                        task.retries(),
                        e
                    );
                    self.stats.record_drop("fetch");
                }
            }
        }

        self.scheduler.complete();
    }
}
