//! Custom scopes: storage for components that are neither singletons nor prototypes.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::DiResult;
use crate::internal::DisposeBag;
use crate::key::AnyArc;

/// Factory handed to a scope when it does not hold an object yet.
pub type ObjectFactory<'a> = &'a mut dyn FnMut() -> DiResult<AnyArc>;

/// Opaque storage for one custom lifetime.
///
/// The container calls [`ScopeProvider::get`] for every request of a component
/// registered under this scope's name, and registers a destruction callback for
/// each new object that needs one.
pub trait ScopeProvider: Send + Sync {
    /// Existing object for `name`, or the one made by `factory`.
    fn get(&self, name: &str, factory: ObjectFactory<'_>) -> DiResult<AnyArc>;

    /// Removes the object; its destruction callback is dropped, not run.
    fn remove(&self, name: &str) -> Option<AnyArc>;

    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>);
}

/// Map-backed scope that lives until [`MapScope::end`] is called.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{AnyArc, MapScope, ScopeProvider};
/// use std::sync::Arc;
///
/// let scope = MapScope::new("request");
/// let a = scope.get("id", &mut || Ok(Arc::new(7u32) as AnyArc)).unwrap();
/// let b = scope.get("id", &mut || Ok(Arc::new(8u32) as AnyArc)).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// scope.end();
/// assert!(scope.is_empty());
/// ```
pub struct MapScope {
    id: String,
    objects: Mutex<HashMap<String, AnyArc>>,
    disposers: Mutex<DisposeBag>,
}

impl MapScope {
    pub fn new(id: impl Into<String>) -> Self {
        MapScope {
            id: id.into(),
            objects: Mutex::new(HashMap::new()),
            disposers: Mutex::new(DisposeBag::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Runs destruction callbacks in reverse registration order and clears the scope.
    pub fn end(&self) {
        let mut bag = std::mem::take(&mut *self.disposers.lock());
        bag.run_all_reverse();
        self.objects.lock().clear();
        debug!(scope = %self.id, "scope ended");
    }
}

impl ScopeProvider for MapScope {
    fn get(&self, name: &str, factory: ObjectFactory<'_>) -> DiResult<AnyArc> {
        if let Some(existing) = self.objects.lock().get(name) {
            return Ok(existing.clone());
        }
        // The factory may reenter this scope for its own dependencies.
        let created = factory()?;
        let mut objects = self.objects.lock();
        Ok(objects.entry(name.to_string()).or_insert(created).clone())
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        self.disposers.lock().remove(name);
        self.objects.lock().remove(name)
    }

    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>) {
        self.disposers.lock().push(name, callback);
    }
}

impl Drop for MapScope {
    fn drop(&mut self) {
        if !self.disposers.get_mut().is_empty() {
            debug!(scope = %self.id, "scope dropped without end(); destruction callbacks skipped");
        }
    }
}
