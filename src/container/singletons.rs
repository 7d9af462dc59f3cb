//! Singleton registry: finished instances, early references and dependency edges.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};

use crate::early::EarlyReference;
use crate::error::DiResult;
use crate::key::AnyArc;

/// Shared state of every singleton of one container.
///
/// Reads of finished instances go through `ready` without touching the creation
/// lock. Creation is serialized by one reentrant lock, so a thread asking for a
/// singleton another thread is building waits for it instead of racing it.
#[derive(Default)]
pub(crate) struct SingletonRegistry {
    creation: ReentrantMutex<()>,
    ready: RwLock<HashMap<String, AnyArc>>,
    early: Mutex<HashMap<String, Arc<EarlyReference>>>,
    order: Mutex<Vec<String>>,
    // dependency -> components that were wired with it
    dependents: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl SingletonRegistry {
    pub(crate) fn get(&self, name: &str) -> Option<AnyArc> {
        self.ready.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.ready.read().contains_key(name)
    }

    pub(crate) fn creation_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.creation.lock()
    }

    pub(crate) fn insert(&self, name: &str, instance: AnyArc) {
        if self.ready.write().insert(name.to_string(), instance).is_none() {
            self.order.lock().push(name.to_string());
        }
    }

    /// Early reference for `name`, created by `make` on first request.
    pub(crate) fn early_for(
        &self,
        name: &str,
        make: impl FnOnce() -> DiResult<EarlyReference>,
    ) -> DiResult<Arc<EarlyReference>> {
        let mut early = self.early.lock();
        if let Some(existing) = early.get(name) {
            return Ok(existing.clone());
        }
        let created = Arc::new(make()?);
        early.insert(name.to_string(), created.clone());
        Ok(created)
    }

    pub(crate) fn take_early(&self, name: &str) -> Option<Arc<EarlyReference>> {
        self.early.lock().remove(name)
    }

    pub(crate) fn register_dependent(&self, dependency: &str, dependent: &str) {
        if dependency == dependent {
            return;
        }
        self.dependents
            .lock()
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .lock()
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes one instance, returning it when it was registered.
    pub(crate) fn remove(&self, name: &str) -> Option<AnyArc> {
        let removed = self.ready.write().remove(name);
        if removed.is_some() {
            self.order.lock().retain(|n| n != name);
        }
        removed
    }

    /// Names in teardown order: reverse creation order, with every component's
    /// dependents placed before it.
    pub(crate) fn destruction_order(&self) -> Vec<String> {
        let order = self.order.lock().clone();
        let dependents = self.dependents.lock().clone();
        let ready: HashSet<String> = self.ready.read().keys().cloned().collect();

        let mut visited = HashSet::new();
        let mut result = Vec::with_capacity(order.len());
        for name in order.iter().rev() {
            visit(name, &dependents, &ready, &mut visited, &mut result);
        }
        result
    }

    /// Drops every instance and edge; returns the instances in `names` order.
    pub(crate) fn drain(&self, names: &[String]) -> Vec<(String, AnyArc)> {
        let mut ready = self.ready.write();
        let drained = names
            .iter()
            .filter_map(|n| ready.remove(n).map(|instance| (n.clone(), instance)))
            .collect();
        ready.clear();
        self.order.lock().clear();
        self.dependents.lock().clear();
        self.early.lock().clear();
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.ready.read().len()
    }
}

fn visit(
    name: &str,
    dependents: &HashMap<String, BTreeSet<String>>,
    ready: &HashSet<String>,
    visited: &mut HashSet<String>,
    result: &mut Vec<String>,
) {
    if !ready.contains(name) || !visited.insert(name.to_string()) {
        return;
    }
    if let Some(users) = dependents.get(name) {
        for user in users {
            visit(user, dependents, ready, visited, result);
        }
    }
    result.push(name.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> SingletonRegistry {
        let registry = SingletonRegistry::default();
        for name in names {
            registry.insert(name, Arc::new(name.to_string()));
        }
        registry
    }

    #[test]
    fn teardown_is_reverse_creation_order() {
        let registry = registry(&["a", "b", "c"]);
        assert_eq!(registry.destruction_order(), vec!["c", "b", "a"]);
    }

    #[test]
    fn dependents_are_destroyed_before_their_dependencies() {
        // "late" was created last but "early" depends on it
        let registry = registry(&["early", "late"]);
        registry.register_dependent("late", "early");
        assert_eq!(registry.destruction_order(), vec!["early", "late"]);
    }

    #[test]
    fn mutual_dependents_terminate() {
        let registry = registry(&["a", "b"]);
        registry.register_dependent("a", "b");
        registry.register_dependent("b", "a");
        let order = registry.destruction_order();
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn drain_clears_everything() {
        let registry = registry(&["a", "b"]);
        let drained = registry.drain(&["b".to_string(), "a".to_string()]);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0, "b");
        assert_eq!(registry.len(), 0);
        assert!(!registry.contains("a"));
    }
}
