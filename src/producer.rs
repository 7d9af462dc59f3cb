//! Delegating producers: definitions whose object is made indirectly.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::early::{Capability, CapabilitySet};
use crate::error::DiResult;
use crate::key::{AnyArc, TypeKey};
use crate::marker::Marker;

/// Factory standing between a definition and its object.
///
/// The product must be stored the way the container stores `object_type()`:
/// a concrete `Arc<T>`, or `Arc<Arc<dyn Trait>>` when the object type is a trait.
pub trait Producer: Send + Sync + 'static {
    fn object_type(&self) -> TypeKey;

    fn produce(&self, container: &Container) -> DiResult<AnyArc>;

    /// Capability set an early reference may expose while the product is being made.
    fn capabilities(&self) -> Option<&CapabilitySet> {
        None
    }

    /// Markers on the producing method, consulted by qualifier matching.
    fn markers(&self) -> &[Marker] {
        &[]
    }
}

type ProduceFn = Arc<dyn Fn(&Container) -> DiResult<AnyArc> + Send + Sync>;

/// Closure-backed [`Producer`].
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ComponentDefinition, ComponentRegistry, FnProducer};
/// use std::sync::Arc;
///
/// struct Pool { size: usize }
///
/// let mut registry = ComponentRegistry::new();
/// registry
///     .register_definition(ComponentDefinition::produced_by(
///         "pool",
///         Arc::new(FnProducer::new(|_| Ok(Pool { size: 4 }))),
///     ))
///     .unwrap();
/// let container = registry.build().unwrap();
/// assert_eq!(container.get::<Pool>().unwrap().size, 4);
/// ```
#[derive(Clone)]
pub struct FnProducer {
    object_type: TypeKey,
    produce: ProduceFn,
    capabilities: Option<CapabilitySet>,
    markers: Vec<Marker>,
}

impl FnProducer {
    /// Producer of a concrete `T`.
    pub fn new<T, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> DiResult<T> + Send + Sync + 'static,
    {
        FnProducer {
            object_type: TypeKey::of::<T>(),
            produce: Arc::new(move |c| f(c).map(|t| Arc::new(t) as AnyArc)),
            capabilities: None,
            markers: Vec::new(),
        }
    }

    /// Producer whose object type is the trait object `V`.
    pub fn of_trait<V, F>(f: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> DiResult<Arc<V>> + Send + Sync + 'static,
    {
        FnProducer {
            object_type: TypeKey::of::<V>(),
            produce: Arc::new(move |c| f(c).map(|v| Arc::new(v) as AnyArc)),
            capabilities: None,
            markers: Vec::new(),
        }
    }

    /// Adds a capability the early reference can expose.
    pub fn exposing(mut self, capability: Capability) -> Self {
        self.capabilities
            .get_or_insert_with(CapabilitySet::new)
            .push(capability);
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }
}

impl Producer for FnProducer {
    fn object_type(&self) -> TypeKey {
        self.object_type
    }

    fn produce(&self, container: &Container) -> DiResult<AnyArc> {
        (self.produce)(container)
    }

    fn capabilities(&self) -> Option<&CapabilitySet> {
        self.capabilities.as_ref()
    }

    fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

impl fmt::Debug for FnProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProducer")
            .field("object_type", &self.object_type)
            .field("capabilities", &self.capabilities)
            .field("markers", &self.markers)
            .finish()
    }
}
