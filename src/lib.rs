//! # trawler
//!
//! A crawl orchestration engine: a pool of workers pulls fetch tasks from
//! a shared scheduler, runs each through a fetch/parse/emit pipeline,
//! feeds discovered follow-up tasks back into the queue, and coordinates
//! pause, resume, hot rule-reload, and graceful shutdown across the pool.
//!
//! The engine owns the scheduling and lifecycle machinery; the fetch,
//! extraction, and output stages are collaborator traits supplied by the
//! caller: [`Fetcher`], [`RuleProvider`], and [`Pipeline`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use trawler::{EngineBuilder, Fetcher, RuleProvider, ParseOutput, Task};
//!
//! struct ArticleRules;
//!
//! #[trawler::async_trait]
//! impl RuleProvider for ArticleRules {
//!     type Record = Article;
//!
//!     async fn parse(&self, response: &FetchResponse, task: &Task)
//!         -> Result<ParseOutput<Article>, ParseError>
//!     {
//!         let mut output = ParseOutput::new();
//!         // ... extract fields and discover follow-up targets ...
//!         Ok(output)
//!     }
//! }
//!
//! async fn crawl() -> Result<(), trawler::EngineError> {
//!     let stats = EngineBuilder::new()
//!         .workers(4)
//!         .seed(Task::get("https://example.com/articles"))
//!         .rule_provider(ArticleRules)
//!         .fetcher(HttpFetcher::default())
//!         .build()?
//!         .run()
//!         .await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod events;
pub mod fetch;
pub mod pipeline;
pub mod prelude;
pub mod proxy;
pub mod rule;
pub mod scheduler;
pub mod start;
pub mod stats;
pub mod task;
pub mod worker;

pub use builder::{EngineBuilder, EngineConfig};
pub use engine::{Engine, EngineHandle};
pub use error::{EmitError, EngineError, FetchError, ParseError};
pub use events::EventListener;
pub use fetch::{FetchResponse, Fetcher};
pub use pipeline::{JsonWriter, Pipeline};
pub use proxy::{FetchProfile, ProxyProfile, ProxySelector, RotatingSelector};
pub use rule::{ParseOutput, RuleProvider};
pub use scheduler::{DequeueOutcome, MemoryScheduler, Scheduler, SchedulerMode};
pub use stats::{StatCollector, StatsSnapshot};
pub use task::{Method, Task};
pub use worker::RunState;

pub use async_trait::async_trait;
pub use tokio;
