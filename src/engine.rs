//! # Engine Module
//!
//! Implements the engine that owns the configuration, the scheduler, and
//! the worker pool, and drives the crawl lifecycle.
//!
//! ## Lifecycle
//!
//! An [`Engine`] comes out of the builder configured and inert. `start`
//! seeds the scheduler, spawns the workers, and hands back an
//! [`EngineHandle`] — the only way to interact with a running crawl.
//! `start` consumes the engine, so starting twice is unrepresentable.
//!
//! Pause, restart, and stop are broadcast to the pool over a watch
//! channel and honored at iteration boundaries. Hot rule reload swaps the
//! provider slot between pause and restart, so no worker ever observes a
//! provider change mid-task.
//!
//! ## Shutdown
//!
//! Every worker signals the completion barrier exactly once when its loop
//! exits — at queue quiescence in drain mode, after an explicit stop in
//! continuous mode. `join` waits for the pool, confirms the barrier,
//! releases fetch and pipeline resources, and delivers the stop event at
//! most once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::builder::EngineConfig;
use crate::error::EngineError;
use crate::events::EventDispatcher;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::proxy::ProxySelector;
use crate::rule::{RuleProvider, RuleSlot};
use crate::scheduler::Scheduler;
use crate::start::load_start_list;
use crate::stats::StatCollector;
use crate::task::Task;
use crate::worker::{RunState, Worker};

/// Counts workers down to zero at shutdown.
///
/// Initialized to the pool size; every worker arrives exactly once when
/// its loop exits, and the engine's `join` resolves once the count hits
/// zero.
pub(crate) struct CompletionBarrier {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CompletionBarrier {
    pub(crate) fn new(count: usize) -> Self {
        CompletionBarrier {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        }
    }

    /// Signals that one worker has finished. Exactly once per worker.
    pub(crate) fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Resolves once every worker has arrived.
    pub(crate) async fn wait(&self) {
        while self.remaining.load(Ordering::SeqCst) != 0 {
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(25)) => {}
            }
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

/// A configured crawl engine, ready to start.
pub struct Engine<R: Send + 'static> {
    config: EngineConfig,
    seeds: Vec<Task>,
    scheduler: Arc<dyn Scheduler>,
    proxies: Arc<dyn ProxySelector>,
    rules: RuleSlot<R>,
    fetcher: Arc<dyn Fetcher>,
    pipeline: Arc<dyn Pipeline<R>>,
    events: Arc<EventDispatcher>,
}

impl<R: Send + 'static> Engine<R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        config: EngineConfig,
        seeds: Vec<Task>,
        scheduler: Arc<dyn Scheduler>,
        proxies: Arc<dyn ProxySelector>,
        rules: RuleSlot<R>,
        fetcher: Arc<dyn Fetcher>,
        pipeline: Arc<dyn Pipeline<R>>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Engine {
            config,
            seeds,
            scheduler,
            proxies,
            rules,
            fetcher,
            pipeline,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Seeds the scheduler, spawns the worker pool, and fires the start
    /// event. Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<EngineHandle<R>, EngineError> {
        if self.config.debug {
            info!("engine configuration: {:?}", self.config);
        }

        let stats = Arc::new(StatCollector::new());

        if let Some(path) = &self.config.start_list {
            for task in load_start_list(path)? {
                self.scheduler.enqueue(task);
                stats.increment_tasks_enqueued();
            }
        }
        for task in self.seeds {
            self.scheduler.enqueue(task);
            stats.increment_tasks_enqueued();
        }

        let barrier = Arc::new(CompletionBarrier::new(self.config.workers));
        let (control_tx, control_rx) = watch::channel(RunState::Running);

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let worker = Worker::new(
                id,
                Arc::clone(&self.scheduler),
                self.rules.clone(),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.pipeline),
                Arc::clone(&self.proxies),
                control_rx.clone(),
                Arc::clone(&stats),
                Arc::clone(&barrier),
                self.config.max_retries,
                self.config.proxy_enabled,
                self.config.mobile,
            );
            workers.push(tokio::spawn(worker.run()));
        }
        drop(control_rx);

        info!(
            "engine started: {} workers, {:?} mode",
            self.config.workers, self.config.mode
        );
        self.events.fire_start(&stats);

        Ok(EngineHandle {
            control: control_tx,
            scheduler: self.scheduler,
            rules: self.rules,
            fetcher: self.fetcher,
            pipeline: self.pipeline,
            events: self.events,
            stats,
            barrier,
            workers,
        })
    }

    /// Starts the engine and blocks until it finishes — at queue
    /// quiescence in drain mode. Continuous crawls keep no handle to stop
    /// themselves with, so use [`Engine::start`] there instead.
    pub async fn run(self) -> Result<Arc<StatCollector>, EngineError> {
        let handle = self.start()?;
        let stats = handle.stats();
        handle.join().await?;
        Ok(stats)
    }
}

/// Control surface of a running engine.
pub struct EngineHandle<R: Send + 'static> {
    control: watch::Sender<RunState>,
    scheduler: Arc<dyn Scheduler>,
    rules: RuleSlot<R>,
    fetcher: Arc<dyn Fetcher>,
    pipeline: Arc<dyn Pipeline<R>>,
    events: Arc<EventDispatcher>,
    stats: Arc<StatCollector>,
    barrier: Arc<CompletionBarrier>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> EngineHandle<R> {
    /// Adds a task to the running crawl.
    pub fn enqueue(&self, task: Task) {
        self.scheduler.enqueue(task);
        self.stats.increment_tasks_enqueued();
    }

    /// Asks every worker to suspend at its next iteration boundary.
    /// In-flight tasks finish first. A no-op if no workers are live.
    pub fn pause(&self) {
        if self.control.receiver_count() == 0 {
            debug!("pause requested but no workers are live");
            return;
        }
        let changed = self.control.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            info!("engine paused");
            self.events.fire_pause(&self.stats);
        }
    }

    /// Resumes a paused pool.
    pub fn restart(&self) {
        if self.control.receiver_count() == 0 {
            debug!("restart requested but no workers are live");
            return;
        }
        let changed = self.control.send_if_modified(|state| {
            if *state == RunState::Paused {
                *state = RunState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            info!("engine restarted");
            self.events.fire_restart(&self.stats);
        }
    }

    /// Asks every worker to exit at its next iteration boundary and
    /// unblocks dequeues. Continuous mode relies on this to terminate.
    pub fn stop(&self) {
        let changed = self.control.send_if_modified(|state| {
            if *state == RunState::Stopped {
                false
            } else {
                *state = RunState::Stopped;
                true
            }
        });
        self.scheduler.stop();
        if changed {
            info!("engine stop requested");
        }
        self.events.fire_stop(&self.stats);
    }

    /// Hot rule reload: pause, swap the provider atomically, restart.
    /// Workers pick up the new provider on the next task they process
    /// after resuming, never mid-task.
    pub fn reload_rules(&self, provider: impl RuleProvider<Record = R> + 'static) {
        debug!("begin rule reload");
        self.pause();
        self.rules.store(Arc::new(provider));
        self.restart();
        info!("rule provider reloaded");
    }

    /// Current broadcast run state.
    pub fn state(&self) -> RunState {
        *self.control.borrow()
    }

    /// Shared counters for this crawl.
    pub fn stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.stats)
    }

    /// Waits for every worker to finish, then releases fetch and
    /// pipeline resources and delivers the stop event. In drain mode this
    /// resolves once the queue reaches quiescence; in continuous mode
    /// only after [`EngineHandle::stop`].
    pub async fn join(mut self) -> Result<(), EngineError> {
        let results = join_all(std::mem::take(&mut self.workers)).await;
        let mut failures = 0usize;
        for result in results {
            if let Err(e) = result {
                failures += 1;
                error!("worker task failed during shutdown: {e}");
            }
        }
        if failures == 0 {
            self.barrier.wait().await;
        } else {
            warn!("{failures} workers never reached the completion barrier, proceeding with shutdown");
        }

        self.fetcher.close().await;
        self.pipeline.close().await;

        let snapshot = self.stats.snapshot();
        info!(
            "crawl finished: {} tasks succeeded, {} dropped, {} records emitted in {:?}",
            snapshot.tasks_succeeded,
            snapshot.tasks_dropped,
            snapshot.records_emitted,
            snapshot.elapsed
        );
        self.events.fire_stop(&self.stats);

        if failures > 0 {
            return Err(EngineError::Interrupted(format!(
                "{failures} worker tasks failed"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EngineBuilder;
    use crate::error::{FetchError, ParseError};
    use crate::events::EventListener;
    use crate::fetch::FetchResponse;
    use crate::proxy::FetchProfile;
    use crate::rule::ParseOutput;
    use crate::scheduler::SchedulerMode;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;

    fn init_tracing() {
        use tracing_subscriber::EnvFilter;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    async fn wait_until(mut pred: impl FnMut() -> bool) {
        for _ in 0..200 {
            if pred() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    struct StubFetcher {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(
            &self,
            task: &Task,
            _profile: &FetchProfile,
        ) -> Result<FetchResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(FetchError::new(task.target(), "connection refused"))
            } else {
                Ok(FetchResponse::new(task.target(), 200, "<html></html>"))
            }
        }
    }

    /// Extracts the task's own target as the record, no follow-ups.
    struct LeafRules;

    #[async_trait]
    impl RuleProvider for LeafRules {
        type Record = String;

        async fn parse(
            &self,
            _response: &FetchResponse,
            task: &Task,
        ) -> Result<ParseOutput<String>, ParseError> {
            Ok(ParseOutput::new().with_record(task.target().to_string()))
        }
    }

    /// Spawns a small task tree: the root discovers 3 children, each
    /// child discovers 2 grandchildren. 10 tasks in total.
    struct FanoutRules;

    #[async_trait]
    impl RuleProvider for FanoutRules {
        type Record = String;

        async fn parse(
            &self,
            _response: &FetchResponse,
            task: &Task,
        ) -> Result<ParseOutput<String>, ParseError> {
            let mut output = ParseOutput::new().with_record(task.target().to_string());
            let segment = task.target().rsplit('/').next().unwrap_or("");
            let depth: u32 = segment
                .trim_start_matches('d')
                .split('-')
                .next()
                .unwrap_or("0")
                .parse()
                .unwrap_or(0);
            let children = match depth {
                2 => 3,
                1 => 2,
                _ => 0,
            };
            for i in 0..children {
                output.push_task(Task::get(format!(
                    "https://example.com/d{}-{}{}",
                    depth - 1,
                    segment,
                    i
                )));
            }
            Ok(output)
        }
    }

    /// Records which provider generation parsed each task.
    struct TaggedRules {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl RuleProvider for TaggedRules {
        type Record = String;

        async fn parse(
            &self,
            _response: &FetchResponse,
            _task: &Task,
        ) -> Result<ParseOutput<String>, ParseError> {
            self.log.lock().unwrap().push(self.tag);
            Ok(ParseOutput::new())
        }
    }

    struct CollectingPipeline {
        records: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Pipeline<String> for CollectingPipeline {
        async fn emit(&self, record: String) -> Result<(), crate::error::EmitError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingListener {
        starts: Arc<AtomicUsize>,
        pauses: Arc<AtomicUsize>,
        restarts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl EventListener for CountingListener {
        fn on_start(&self, _stats: &StatCollector) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_pause(&self, _stats: &StatCollector) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
        fn on_restart(&self, _stats: &StatCollector) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_stop(&self, _stats: &StatCollector) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast() -> Duration {
        Duration::from_millis(10)
    }

    #[tokio::test]
    async fn drain_processes_all_seeds_and_fires_stop_once() {
        init_tracing();
        let calls = Arc::new(AtomicUsize::new(0));
        let records = Arc::new(Mutex::new(Vec::new()));
        let listener = CountingListener::default();

        let engine = EngineBuilder::new()
            .workers(2)
            .max_retries(0)
            .poll_interval(fast())
            .seed(Task::get("https://example.com/a"))
            .seed(Task::get("https://example.com/b"))
            .seed(Task::get("https://example.com/c"))
            .rule_provider(LeafRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .pipeline(CollectingPipeline {
                records: Arc::clone(&records),
            })
            .listener(listener.clone())
            .build()
            .unwrap();

        let handle = engine.start().unwrap();
        let barrier = Arc::clone(&handle.barrier);
        let stats = handle.stats();
        handle.join().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.snapshot().tasks_succeeded, 3);
        assert_eq!(records.lock().unwrap().len(), 3);
        // Both workers arrived exactly once: 2 → 0.
        assert_eq!(barrier.remaining(), 0);
        assert_eq!(listener.starts.load(Ordering::SeqCst), 1);
        assert_eq!(listener.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_fetch_is_attempted_budget_plus_one_times() {
        let calls = Arc::new(AtomicUsize::new(0));

        let stats = EngineBuilder::<String>::new()
            .workers(1)
            .max_retries(2)
            .poll_interval(fast())
            .seed(Task::get("https://example.com/broken"))
            .rule_provider(LeafRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: true,
            })
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        // 1 initial attempt + 2 retries, then a terminal drop — and the
        // engine still drained normally.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tasks_retried, 2);
        assert_eq!(snapshot.tasks_dropped, 1);
        assert_eq!(snapshot.drop_stages.get("fetch"), Some(&1));
        assert_eq!(snapshot.tasks_succeeded, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn followup_discovery_defers_termination() {
        let calls = Arc::new(AtomicUsize::new(0));

        let stats = EngineBuilder::<String>::new()
            .workers(4)
            .poll_interval(fast())
            .seed(Task::get("https://example.com/d2"))
            .rule_provider(FanoutRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        // The engine must not terminate while any worker is between
        // fetch-success and follow-up enqueue: all 10 tasks of the tree
        // get processed.
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(stats.snapshot().tasks_succeeded, 10);
    }

    #[tokio::test]
    async fn pause_blocks_fetch_until_restart() {
        init_tracing();
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = CountingListener::default();

        let engine = EngineBuilder::<String>::new()
            .workers(2)
            .mode(SchedulerMode::Continuous)
            .poll_interval(fast())
            .rule_provider(LeafRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .listener(listener.clone())
            .build()
            .unwrap();

        let handle = engine.start().unwrap();
        handle.pause();
        assert_eq!(handle.state(), RunState::Paused);

        handle.enqueue(Task::get("https://example.com/deferred"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        // The task was claimed but never entered the fetch stage.
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        handle.restart();
        let stats = handle.stats();
        wait_until(|| stats.snapshot().tasks_succeeded == 1).await;
        // Exactly once: not lost, not duplicated.
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.stop();
        handle.join().await.unwrap();
        assert_eq!(listener.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(listener.restarts.load(Ordering::SeqCst), 1);
        assert_eq!(listener.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rule_reload_is_visible_only_after_restart() {
        let calls = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));

        let engine = EngineBuilder::<String>::new()
            .workers(1)
            .mode(SchedulerMode::Continuous)
            .poll_interval(fast())
            .rule_provider(TaggedRules {
                tag: "old",
                log: Arc::clone(&log),
            })
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .build()
            .unwrap();

        let handle = engine.start().unwrap();
        handle.enqueue(Task::get("https://example.com/1"));
        wait_until(|| log.lock().unwrap().len() == 1).await;

        handle.reload_rules(TaggedRules {
            tag: "new",
            log: Arc::clone(&log),
        });
        assert_eq!(handle.state(), RunState::Running);

        handle.enqueue(Task::get("https://example.com/2"));
        wait_until(|| log.lock().unwrap().len() == 2).await;

        handle.stop();
        handle.join().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["old", "new"]);
    }

    #[tokio::test]
    async fn continuous_mode_runs_until_explicit_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = CountingListener::default();

        let engine = EngineBuilder::<String>::new()
            .workers(2)
            .mode(SchedulerMode::Continuous)
            .poll_interval(fast())
            .seed(Task::get("https://example.com/a"))
            .seed(Task::get("https://example.com/b"))
            .rule_provider(LeafRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .listener(listener.clone())
            .build()
            .unwrap();

        let handle = engine.start().unwrap();
        let stats = handle.stats();
        wait_until(|| stats.snapshot().tasks_succeeded == 2).await;

        // Queue is long quiescent, but no worker exits on its own.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.barrier.remaining(), 2);

        handle.stop();
        handle.join().await.unwrap();
        assert_eq!(listener.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_with_empty_queue_terminates_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));

        let stats = EngineBuilder::<String>::new()
            .workers(2)
            .poll_interval(fast())
            .rule_provider(LeafRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.snapshot().tasks_succeeded, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_list_file_seeds_the_queue() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"target": "https://example.com/s1"}}, {{"target": "https://example.com/s2"}}]"#
        )
        .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let stats = EngineBuilder::<String>::new()
            .workers(1)
            .poll_interval(fast())
            .start_list(file.path())
            .rule_provider(LeafRules)
            .fetcher(StubFetcher {
                calls: Arc::clone(&calls),
                fail: false,
            })
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tasks_enqueued, 2);
        assert_eq!(snapshot.tasks_succeeded, 2);
    }
}
