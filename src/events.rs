//! Lifecycle event notifications.
//!
//! At most one listener can be registered on an engine; it receives each
//! transition synchronously from the engine control path, together with a
//! read-only view of the engine's counters, at most once per transition.
//! The stop notification is guarded so that an explicit `stop()` and the
//! drain-mode completion path cannot both deliver it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::stats::StatCollector;

/// Receives engine lifecycle transitions.
///
/// All methods default to no-ops so listeners implement only what they
/// observe. Implementations must not block for long: they run on the
/// engine control path, outside the worker hot loop.
pub trait EventListener: Send + Sync {
    fn on_start(&self, _stats: &StatCollector) {}
    fn on_pause(&self, _stats: &StatCollector) {}
    fn on_restart(&self, _stats: &StatCollector) {}
    fn on_stop(&self, _stats: &StatCollector) {}
}

/// Dispatches lifecycle events to the optional registered listener.
pub(crate) struct EventDispatcher {
    listener: Option<Arc<dyn EventListener>>,
    stop_fired: AtomicBool,
}

impl EventDispatcher {
    pub(crate) fn new(listener: Option<Arc<dyn EventListener>>) -> Self {
        EventDispatcher {
            listener,
            stop_fired: AtomicBool::new(false),
        }
    }

    pub(crate) fn fire_start(&self, stats: &StatCollector) {
        if let Some(listener) = &self.listener {
            listener.on_start(stats);
        }
    }

    pub(crate) fn fire_pause(&self, stats: &StatCollector) {
        if let Some(listener) = &self.listener {
            listener.on_pause(stats);
        }
    }

    pub(crate) fn fire_restart(&self, stats: &StatCollector) {
        if let Some(listener) = &self.listener {
            listener.on_restart(stats);
        }
    }

    /// Delivers the stop event at most once for the engine's lifetime.
    pub(crate) fn fire_stop(&self, stats: &StatCollector) {
        if self.stop_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = &self.listener {
            listener.on_stop(stats);
        }
    }
}
