//! # Builder Module
//!
//! Provides the `EngineBuilder`, a fluent API for constructing and
//! configuring [`Engine`] instances.
//!
//! ## Overview
//!
//! The builder assembles the engine's collaborators — rule provider,
//! fetcher, pipeline, proxy selector, scheduler, lifecycle listener —
//! around an [`EngineConfig`]. Configuration is validated once in
//! [`EngineBuilder::build`] and is immutable from then on: the builder is
//! consumed into the engine, and the engine is consumed by `start`, so a
//! running engine can never be reconfigured or started twice.
//!
//! ## Example
//!
//! ```rust,ignore
//! use trawler::{EngineBuilder, SchedulerMode, Task};
//!
//! let engine = EngineBuilder::new()
//!     .workers(4)
//!     .max_retries(2)
//!     .mode(SchedulerMode::Drain)
//!     .seed(Task::get("https://example.com"))
//!     .rule_provider(MyRules)
//!     .fetcher(MyFetcher)
//!     .build()?;
//! let stats = engine.run().await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::{EventDispatcher, EventListener};
use crate::fetch::Fetcher;
use crate::pipeline::{JsonWriter, Pipeline};
use crate::proxy::{ProxySelector, RotatingSelector};
use crate::rule::{RuleProvider, RuleSlot};
use crate::scheduler::{MemoryScheduler, Scheduler, SchedulerMode};
use crate::task::Task;

/// Immutable engine configuration, fixed at build time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of workers in the pool.
    pub workers: usize,
    /// Fallback re-check tick for blocked queue and barrier waits.
    pub poll_interval: Duration,
    /// Fetch retries granted to each task beyond its first attempt.
    pub max_retries: u32,
    /// Termination policy of the default scheduler.
    pub mode: SchedulerMode,
    /// Gates proxy selection for the whole pool.
    pub proxy_enabled: bool,
    /// Applies the mobile profile to every fetch.
    pub mobile: bool,
    /// Logs the full configuration at startup.
    pub debug: bool,
    /// Optional start-task list merged with the builder's seeds.
    pub start_list: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: 1,
            poll_interval: Duration::from_millis(100),
            max_retries: 3,
            mode: SchedulerMode::Drain,
            proxy_enabled: true,
            mobile: false,
            debug: false,
            start_list: None,
        }
    }
}

/// Fluent builder for [`Engine`].
pub struct EngineBuilder<R: Send + 'static> {
    config: EngineConfig,
    seeds: Vec<Task>,
    scheduler: Option<Arc<dyn Scheduler>>,
    proxies: Option<Arc<dyn ProxySelector>>,
    rules: Option<Arc<dyn RuleProvider<Record = R>>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    pipeline: Option<Arc<dyn Pipeline<R>>>,
    listener: Option<Arc<dyn EventListener>>,
}

impl<R: Send + 'static> Default for EngineBuilder<R> {
    fn default() -> Self {
        EngineBuilder {
            config: EngineConfig::default(),
            seeds: Vec::new(),
            scheduler: None,
            proxies: None,
            rules: None,
            fetcher: None,
            pipeline: None,
            listener: None,
        }
    }
}

impl<R: Send + 'static> EngineBuilder<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker pool size. Zero is clamped to one at build time.
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Sets the fallback re-check tick for blocked waits.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Sets how many fetch retries each task gets beyond its first
    /// attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Selects drain-to-completion or continuous operation.
    pub fn mode(mut self, mode: SchedulerMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Enables or disables proxy selection pool-wide.
    pub fn proxy(mut self, enabled: bool) -> Self {
        self.config.proxy_enabled = enabled;
        self
    }

    /// Applies the mobile profile to every fetch.
    pub fn mobile(mut self, mobile: bool) -> Self {
        self.config.mobile = mobile;
        self
    }

    /// Logs the full configuration at startup.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Points the engine at a start-task list file. The file may be
    /// absent; a malformed one fails `start`.
    pub fn start_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.start_list = Some(path.into());
        self
    }

    /// Registers a seed task.
    pub fn seed(mut self, task: Task) -> Self {
        self.seeds.push(task);
        self
    }

    /// Registers a GET seed for each target.
    pub fn seed_targets<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.seeds.extend(targets.into_iter().map(Task::get));
        self
    }

    /// Replaces the default in-memory scheduler.
    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Replaces the default (empty) proxy selector.
    pub fn proxy_selector(mut self, selector: impl ProxySelector + 'static) -> Self {
        self.proxies = Some(Arc::new(selector));
        self
    }

    /// Sets the rule provider. Required.
    pub fn rule_provider(mut self, provider: impl RuleProvider<Record = R> + 'static) -> Self {
        self.rules = Some(Arc::new(provider));
        self
    }

    /// Sets the fetch collaborator. Required.
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Sets the output pipeline. Defaults to the JSON stdout writer.
    pub fn pipeline(mut self, pipeline: impl Pipeline<R> + 'static) -> Self {
        self.pipeline = Some(Arc::new(pipeline));
        self
    }

    /// Registers the lifecycle event listener.
    pub fn listener(mut self, listener: impl EventListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }
}

impl<R: Serialize + Send + 'static> EngineBuilder<R> {
    /// Validates the configuration and assembles the engine.
    pub fn build(mut self) -> Result<Engine<R>, EngineError> {
        if self.config.workers == 0 {
            warn!("worker count 0 requested, running with 1 worker");
            self.config.workers = 1;
        }
        if self.config.poll_interval.is_zero() {
            return Err(EngineError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let rules = self.rules.ok_or_else(|| {
            EngineError::Configuration("engine must have a rule provider".to_string())
        })?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| EngineError::Configuration("engine must have a fetcher".to_string()))?;

        let scheduler = self.scheduler.unwrap_or_else(|| {
            Arc::new(MemoryScheduler::new(
                self.config.mode,
                self.config.poll_interval,
            ))
        });
        let proxies = self
            .proxies
            .unwrap_or_else(|| Arc::new(RotatingSelector::empty()));
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| Arc::new(JsonWriter) as Arc<dyn Pipeline<R>>);

        Ok(Engine::assemble(
            self.config,
            self.seeds,
            scheduler,
            proxies,
            RuleSlot::new(rules),
            fetcher,
            pipeline,
            Arc::new(EventDispatcher::new(self.listener)),
        ))
    }
}
