//! Observers of component lifecycle events.
//!
//! Observers are notified synchronously around creation and destruction, which
//! makes them suitable for tracing and diagnostics. Keep implementations cheap.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DiError;

/// Observer of component lifecycle events.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ContainerObserver, DiError};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     created: AtomicUsize,
/// }
///
/// impl ContainerObserver for CountingObserver {
///     fn creating(&self, _name: &str) {}
///
///     fn created(&self, _name: &str, _elapsed: Duration) {
///         self.created.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn creation_failed(&self, _name: &str, _error: &DiError) {}
/// }
/// ```
pub trait ContainerObserver: Send + Sync {
    /// Called before a component instance is created.
    fn creating(&self, name: &str);

    /// Called after an instance reached the ready state.
    fn created(&self, name: &str, elapsed: Duration);

    /// Called when creation failed; the error is returned to the caller afterwards.
    fn creation_failed(&self, name: &str, error: &DiError);

    /// Called once destruction callbacks of an instance have run.
    fn destroyed(&self, name: &str) {
        let _ = name;
    }
}

/// Registered observers, notified in registration order.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ContainerObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ContainerObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn creating(&self, name: &str) {
        for observer in &self.observers {
            observer.creating(name);
        }
    }

    pub(crate) fn created(&self, name: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.created(name, elapsed);
        }
    }

    pub(crate) fn creation_failed(&self, name: &str, error: &DiError) {
        for observer in &self.observers {
            observer.creation_failed(name, error);
        }
    }

    pub(crate) fn destroyed(&self, name: &str) {
        for observer in &self.observers {
            observer.destroyed(name);
        }
    }
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver {
    prefix: Option<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `scope` field to every event.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        TracingObserver {
            prefix: Some(prefix.into()),
        }
    }

    fn scope(&self) -> &str {
        self.prefix.as_deref().unwrap_or("container")
    }
}

impl ContainerObserver for TracingObserver {
    fn creating(&self, name: &str) {
        debug!(scope = self.scope(), component = %name, "creating component");
    }

    fn created(&self, name: &str, elapsed: Duration) {
        debug!(scope = self.scope(), component = %name, ?elapsed, "component ready");
    }

    fn creation_failed(&self, name: &str, error: &DiError) {
        warn!(scope = self.scope(), component = %name, %error, "component creation failed");
    }

    fn destroyed(&self, name: &str) {
        debug!(scope = self.scope(), component = %name, "component destroyed");
    }
}
