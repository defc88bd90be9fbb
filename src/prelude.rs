//! A "prelude" for users of the `trawler` crate.
//!
//! This prelude re-exports the most commonly used traits, structs, and
//! macros so that they can be easily imported.
//!
//! # Example
//!
//! ```
//! use trawler::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Engine,
    EngineBuilder,
    EngineHandle,
    FetchResponse,
    ParseOutput,
    Task,
    // Core traits
    EventListener,
    Fetcher,
    Pipeline,
    ProxySelector,
    RuleProvider,
    Scheduler,
    // Essential re-export for trait implementation
    async_trait,
};

pub use crate::error::{EmitError, EngineError, FetchError, ParseError};
pub use crate::scheduler::SchedulerMode;
