//! Hook registry: callbacks around initialization and destruction.

use std::sync::Arc;

use crate::error::DiResult;
use crate::key::AnyArc;

/// Callback run around the initialization of every created instance.
///
/// Hooks run in ascending priority; equal priorities keep registration order.
/// A hook may return a replacement instance of the same concrete type, which
/// later hooks and the caller then receive.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{AnyArc, DiResult, InstanceHook};
///
/// struct Audit;
///
/// impl InstanceHook for Audit {
///     fn after_init(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc> {
///         println!("{} is ready", name);
///         Ok(instance)
///     }
/// }
/// ```
pub trait InstanceHook: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    fn before_init(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc> {
        let _ = name;
        Ok(instance)
    }

    fn after_init(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc> {
        let _ = name;
        Ok(instance)
    }
}

/// Callback run before an instance's own destruction callbacks.
pub trait DestructionHook: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this hook wants to see `instance` at all.
    fn applies_to(&self, instance: &AnyArc) -> bool {
        let _ = instance;
        true
    }

    fn before_destroy(&self, name: &str, instance: &AnyArc) -> DiResult<()>;
}

#[derive(Default, Clone)]
pub(crate) struct HookRegistry {
    instance: Vec<Arc<dyn InstanceHook>>,
    destruction: Vec<Arc<dyn DestructionHook>>,
}

impl HookRegistry {
    pub(crate) fn add_instance_hook(&mut self, hook: Arc<dyn InstanceHook>) {
        let at = self
            .instance
            .iter()
            .position(|h| h.priority() > hook.priority())
            .unwrap_or(self.instance.len());
        self.instance.insert(at, hook);
    }

    pub(crate) fn add_destruction_hook(&mut self, hook: Arc<dyn DestructionHook>) {
        let at = self
            .destruction
            .iter()
            .position(|h| h.priority() > hook.priority())
            .unwrap_or(self.destruction.len());
        self.destruction.insert(at, hook);
    }

    pub(crate) fn before_init(&self, name: &str, mut instance: AnyArc) -> DiResult<AnyArc> {
        for hook in &self.instance {
            instance = hook.before_init(name, instance)?;
        }
        Ok(instance)
    }

    pub(crate) fn after_init(&self, name: &str, mut instance: AnyArc) -> DiResult<AnyArc> {
        for hook in &self.instance {
            instance = hook.after_init(name, instance)?;
        }
        Ok(instance)
    }

    pub(crate) fn has_destruction_hooks(&self, instance: &AnyArc) -> bool {
        self.destruction.iter().any(|h| h.applies_to(instance))
    }

    /// Runs every applicable hook; failures are collected, not propagated.
    pub(crate) fn before_destroy(&self, name: &str, instance: &AnyArc) -> Vec<crate::error::DiError> {
        self.destruction
            .iter()
            .filter(|h| h.applies_to(instance))
            .filter_map(|h| h.before_destroy(name, instance).err())
            .collect()
    }
}
