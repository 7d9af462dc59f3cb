//! Internal disposal bag for destruction callbacks of custom scopes.

use std::future::Future;
use std::pin::Pin;

/// Future type for disposal operations.
pub(crate) type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Named destruction callbacks with LIFO execution order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    sync: Vec<(String, Box<dyn FnOnce() + Send>)>,
}

impl DisposeBag {
    /// Add a callback; a later callback for the same name replaces the earlier one.
    pub(crate) fn push(&mut self, name: &str, f: Box<dyn FnOnce() + Send>) {
        self.sync.retain(|(n, _)| n != name);
        self.sync.push((name.to_string(), f));
    }

    /// Drop the callback registered for `name` without running it.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        let before = self.sync.len();
        self.sync.retain(|(n, _)| n != name);
        before != self.sync.len()
    }

    /// Execute all callbacks in reverse order (LIFO).
    pub(crate) fn run_all_reverse(&mut self) {
        while let Some((_, f)) = self.sync.pop() {
            (f)();
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sync.is_empty()
    }
}
