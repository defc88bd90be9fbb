//! # Task Module
//!
//! Defines the unit of work the engine schedules: a fetch target plus the
//! metadata carried along with it.
//!
//! ## Overview
//!
//! A `Task` is created either by the engine when it seeds the queue at
//! start, or by a rule provider when parsing a response discovers
//! follow-up targets. Once created a task is immutable; the only state
//! that advances is its retry counter, and only through
//! [`Task::into_retry`], consumed by the worker that owns the failed
//! attempt.
//!
//! Priority is carried for scheduler backends that order their frontier;
//! the in-memory scheduler hands tasks out unordered and ignores it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// HTTP method of a fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// One fetch-and-process unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    target: String,
    method: Method,
    referrer: Option<String>,
    headers: HashMap<String, String>,
    priority: i32,
    use_proxy: bool,
    retries: u32,
}

impl Task {
    /// Creates a GET task for the given target.
    pub fn get(target: impl Into<String>) -> Self {
        Task {
            target: target.into(),
            method: Method::Get,
            referrer: None,
            headers: HashMap::new(),
            priority: 0,
            use_proxy: true,
            retries: 0,
        }
    }

    /// Creates a POST task for the given target.
    pub fn post(target: impl Into<String>) -> Self {
        Task {
            method: Method::Post,
            ..Task::get(target)
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Controls whether a proxy/mobile profile is applied to this task.
    /// Defaults to `true`; the engine-level proxy flag still gates it.
    pub fn with_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn use_proxy(&self) -> bool {
        self.use_proxy
    }

    /// Number of retries already consumed by failed fetch attempts.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Consumes the task and returns the next attempt of it. Only the
    /// worker that owns the current failed attempt may call this.
    pub(crate) fn into_retry(mut self) -> Task {
        self.retries += 1;
        self
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.target)
    }
}
