//! The frozen container: lookup, candidate resolution and singleton management.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::config::ContainerConfig;
use crate::definition::ComponentDefinition;
use crate::descriptor::DependencyDescriptor;
use crate::error::{DiError, DiResult};
use crate::hooks::HookRegistry;
use crate::internal::circular;
use crate::key::{AnyArc, TypeKey};
use crate::matcher::CandidateMatcher;
use crate::metadata::args::downcast_view;
use crate::metadata::{Resolved, Shape, TypeMetadata};
use crate::observer::Observers;
use crate::planner::InjectionPlanner;
use crate::registry::DefinitionStore;
use crate::scope::ScopeProvider;
use crate::convert::{convert_text, ValueResolver};

mod lifecycle;
mod singletons;

pub use lifecycle::LifecycleState;
use singletons::SingletonRegistry;

/// Container built by [`ComponentRegistry::build`](crate::ComponentRegistry::build).
///
/// Cloning is cheap; clones share definitions, caches and singletons.
///
/// # Thread Safety
///
/// Every entry point may be called from any number of threads. Finished singletons
/// are read without locking; singleton creation is serialized so that each name is
/// created at most once.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Component, ComponentRegistry, Param, TypeMetadata};
/// use std::sync::Arc;
///
/// struct Writer;
/// struct Logger { writer: Arc<Writer> }
///
/// impl Component for Writer {
///     fn metadata() -> TypeMetadata {
///         TypeMetadata::builder::<Writer>().constructor(vec![], |_| Ok(Writer)).build()
///     }
/// }
///
/// impl Component for Logger {
///     fn metadata() -> TypeMetadata {
///         TypeMetadata::builder::<Logger>()
///             .constructor(vec![Param::of::<Writer>()], |args| {
///                 Ok(Logger { writer: args.get::<Writer>(0)? })
///             })
///             .build()
///     }
/// }
///
/// let mut registry = ComponentRegistry::new();
/// registry.register::<Writer>("writer").unwrap();
/// registry.register::<Logger>("logger").unwrap();
/// let container = registry.build().unwrap();
///
/// let logger = container.get::<Logger>().unwrap();
/// assert!(Arc::ptr_eq(&logger.writer, &container.get::<Writer>().unwrap()));
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) store: DefinitionStore,
    pub(crate) metadata: HashMap<TypeKey, Arc<TypeMetadata>>,
    pub(crate) matcher: CandidateMatcher,
    pub(crate) planner: InjectionPlanner,
    pub(crate) hooks: HookRegistry,
    pub(crate) observers: Observers,
    pub(crate) scopes: HashMap<String, Arc<dyn ScopeProvider>>,
    pub(crate) value_resolver: Arc<dyn ValueResolver>,
    pub(crate) config: ContainerConfig,
    pub(crate) singletons: SingletonRegistry,
    pub(crate) states: RwLock<HashMap<String, LifecycleState>>,
}

/// Outcome of resolving one injection point.
pub(crate) struct ResolvedPoint {
    pub(crate) value: Option<Resolved>,
    /// Components that contributed to the value.
    pub(crate) names: Vec<String>,
    /// Set when the point resolved to exactly one component of exactly the requested type.
    pub(crate) shortcut: Option<String>,
}

impl Container {
    pub(crate) fn from_inner(inner: ContainerInner) -> Self {
        Container {
            inner: Arc::new(inner),
        }
    }

    /// The single component of concrete type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let instance = self.resolve_single(TypeKey::of::<T>())?;
        instance
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Component `name` (or an alias), viewed as `T`.
    pub fn get_named<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        self.get_as(name, TypeKey::of::<T>())?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// The single component usable as the trait object `T`.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast_view::<T>(self.resolve_single(TypeKey::of::<T>())?)
    }

    /// Component `name` viewed as the trait object `T`.
    pub fn get_named_trait<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        downcast_view::<T>(self.get_as(name, TypeKey::of::<T>())?)
    }

    /// Every candidate of type `T`, in registration order.
    pub fn get_all<T: Any + Send + Sync>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_all(TypeKey::of::<T>())?
            .into_iter()
            .map(|(_, v)| {
                v.downcast::<T>()
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
            })
            .collect()
    }

    /// Every candidate usable as the trait object `T`, in registration order.
    pub fn get_all_traits<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_all(TypeKey::of::<T>())?
            .into_iter()
            .map(|(_, v)| downcast_view::<T>(v))
            .collect()
    }

    /// Component `name` in the representation of its declared type.
    pub fn get_any(&self, name: &str) -> DiResult<AnyArc> {
        let canonical = self.canonical(name)?;
        self.get_instance(&canonical)
    }

    /// Component `name` converted to the representation of `key`.
    ///
    /// A producer-backed singleton that is still being created on this thread is
    /// returned as an early reference when circular references are allowed.
    pub fn get_as(&self, name: &str, key: TypeKey) -> DiResult<AnyArc> {
        let canonical = self.canonical(name)?;
        let definition = self.definition_arc(&canonical)?;

        if definition.scope().is_singleton() && circular::in_creation_here(&canonical) {
            if let Some(producer) = definition.producer() {
                if !self.inner.config.allow_circular_references {
                    return Err(DiError::CurrentlyInCreation(canonical));
                }
                let early = self
                    .inner
                    .singletons
                    .early_for(&canonical, || {
                        crate::early::EarlyReference::for_producer(&canonical, producer.as_ref())
                    })?;
                self.set_state(&canonical, LifecycleState::EarlyExposed);
                trace!(component = %canonical, view = %key, "exposing early reference");
                return early.reference(key);
            }
            return Err(DiError::Circular(circular::path_to(&canonical)));
        }

        let instance = self.get_instance(&canonical)?;
        self.view(&definition, instance, key)
    }

    /// Creates an anonymous instance of `definition` and views it as `target`.
    ///
    /// The definition is not registered and the instance is not cached.
    pub fn create_nested(&self, definition: &ComponentDefinition, target: TypeKey) -> DiResult<AnyArc> {
        let name = format!("(inner) {}", definition.name());
        let instance = self.create(&name, definition)?;
        self.view(definition, instance, target)
    }

    /// Resolves `descriptor` on behalf of `owner`, as injection would.
    ///
    /// Returns `None` for an optional point without candidates.
    pub fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        owner: Option<&str>,
    ) -> DiResult<Option<Resolved>> {
        let owner = owner.unwrap_or("");
        let point = self.resolve_point(descriptor, owner)?;
        self.register_dependents(&point.names, owner);
        Ok(point.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.store.contains(name)
    }

    pub fn is_singleton(&self, name: &str) -> DiResult<bool> {
        Ok(self.definition(name)?.scope().is_singleton())
    }

    pub fn is_prototype(&self, name: &str) -> DiResult<bool> {
        Ok(self.definition(name)?.scope().is_prototype())
    }

    /// Declared type of component `name`.
    pub fn type_of(&self, name: &str) -> DiResult<TypeKey> {
        Ok(self.definition(name)?.type_key())
    }

    pub fn aliases(&self, name: &str) -> Vec<String> {
        self.inner.store.aliases_of(name)
    }

    /// Names of the components assignable to `key`, in registration order.
    pub fn names_for_type(&self, key: TypeKey) -> Vec<String> {
        self.inner
            .store
            .iter()
            .filter(|d| self.is_assignable(d, key))
            .map(|d| d.name().to_string())
            .collect()
    }

    pub fn definition(&self, name: &str) -> DiResult<&ComponentDefinition> {
        self.inner
            .store
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| DiError::NoSuchComponent(name.to_string()))
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.inner.store.iter().map(|d| d.as_ref())
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// Number of finished singletons.
    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.len()
    }

    pub fn is_singleton_created(&self, name: &str) -> bool {
        self.inner
            .store
            .get(name)
            .is_some_and(|d| self.inner.singletons.contains(d.name()))
    }

    pub(crate) fn value_resolver(&self) -> &dyn ValueResolver {
        self.inner.value_resolver.as_ref()
    }

    pub(crate) fn planner(&self) -> &InjectionPlanner {
        &self.inner.planner
    }

    pub(crate) fn metadata_for(&self, key: TypeKey) -> Option<&Arc<TypeMetadata>> {
        self.inner.metadata.get(&key)
    }

    /// Records that `owner` was wired with each of `names`.
    pub(crate) fn register_dependents(&self, names: &[String], owner: &str) {
        if owner.is_empty() {
            return;
        }
        for name in names {
            self.inner.singletons.register_dependent(name, owner);
        }
    }

    fn canonical(&self, name: &str) -> DiResult<String> {
        let canonical = self.inner.store.canonical_name(name);
        if self.inner.store.contains(canonical) {
            Ok(canonical.to_string())
        } else {
            Err(DiError::NoSuchComponent(name.to_string()))
        }
    }

    fn definition_arc(&self, canonical: &str) -> DiResult<Arc<ComponentDefinition>> {
        self.inner
            .store
            .get(canonical)
            .cloned()
            .ok_or_else(|| DiError::NoSuchComponent(canonical.to_string()))
    }

    fn is_assignable(&self, definition: &ComponentDefinition, key: TypeKey) -> bool {
        if definition.type_key() == key {
            return true;
        }
        if let Some(producer) = definition.producer() {
            if producer.capabilities().is_some_and(|c| c.find(key).is_some()) {
                return true;
            }
        }
        self.metadata_for(definition.type_key())
            .is_some_and(|m| m.is_assignable_to(key))
    }

    /// Converts an instance of `definition` to the representation of `key`.
    fn view(&self, definition: &ComponentDefinition, instance: AnyArc, key: TypeKey) -> DiResult<AnyArc> {
        if definition.type_key() == key {
            return Ok(instance);
        }
        if let Some(capability) = definition
            .producer()
            .and_then(|p| p.capabilities())
            .and_then(|c| c.find(key))
        {
            return capability
                .view(instance)
                .ok_or(DiError::TypeMismatch(key.name()));
        }
        match self.metadata_for(definition.type_key()) {
            Some(metadata) => metadata.view_as(instance, key),
            None => Err(DiError::TypeMismatch(key.name())),
        }
    }

    fn resolve_single(&self, key: TypeKey) -> DiResult<AnyArc> {
        let descriptor = DependencyDescriptor::new(key);
        match self.resolve_point(&descriptor, "")?.value {
            Some(Resolved::One(instance)) => Ok(instance),
            _ => Err(DiError::NoSuchType(key.name())),
        }
    }

    fn resolve_all(&self, key: TypeKey) -> DiResult<Vec<(String, AnyArc)>> {
        let descriptor = DependencyDescriptor::new(key)
            .shaped(Shape::Collection)
            .optional();
        match self.resolve_point(&descriptor, "")?.value {
            Some(Resolved::Many(all)) => Ok(all),
            _ => Ok(Vec::new()),
        }
    }

    /// Resolves one injection point for `owner` (empty for top-level lookups).
    pub(crate) fn resolve_point(
        &self,
        descriptor: &DependencyDescriptor,
        owner: &str,
    ) -> DiResult<ResolvedPoint> {
        let element = descriptor.element();

        if let Some(text) = self.inner.matcher.find_suggested_value(descriptor)? {
            let value = convert_text(&text, element)?;
            return Ok(ResolvedPoint {
                value: Some(Resolved::One(value)),
                names: Vec::new(),
                shortcut: None,
            });
        }

        let eager = descriptor.is_eager() && self.inner.config.allow_eager_type_check;
        let candidates: Vec<&ComponentDefinition> = self
            .inner
            .store
            .iter()
            .map(|d| d.as_ref())
            .filter(|d| d.name() != owner && self.is_assignable(d, element))
            .filter(|d| eager || !self.needs_instantiation(d))
            .filter(|d| {
                let type_markers = self
                    .metadata_for(d.type_key())
                    .map(|m| m.markers())
                    .unwrap_or(&[]);
                self.inner.matcher.is_candidate(d, type_markers, descriptor)
            })
            .collect();

        match descriptor.shape() {
            Shape::Single => {
                let Some(chosen) = self.inner.matcher.determine_candidate(&candidates, descriptor)? else {
                    if descriptor.is_required() {
                        return Err(self.unsatisfied(descriptor, owner, "no matching component"));
                    }
                    return Ok(ResolvedPoint {
                        value: None,
                        names: Vec::new(),
                        shortcut: None,
                    });
                };
                let value = self.get_as(chosen.name(), element)?;
                let shortcut = (candidates.len() == 1 && chosen.type_key() == element)
                    .then(|| chosen.name().to_string());
                Ok(ResolvedPoint {
                    value: Some(Resolved::One(value)),
                    names: vec![chosen.name().to_string()],
                    shortcut,
                })
            }
            Shape::Collection | Shape::Map => {
                if candidates.is_empty() {
                    if descriptor.is_required() {
                        return Err(self.unsatisfied(descriptor, owner, "no matching components"));
                    }
                    return Ok(ResolvedPoint {
                        value: None,
                        names: Vec::new(),
                        shortcut: None,
                    });
                }
                let mut all = Vec::with_capacity(candidates.len());
                for candidate in &candidates {
                    let value = self.get_as(candidate.name(), element)?;
                    all.push((candidate.name().to_string(), value));
                }
                let names = all.iter().map(|(n, _)| n.clone()).collect();
                Ok(ResolvedPoint {
                    value: Some(Resolved::Many(all)),
                    names,
                    shortcut: None,
                })
            }
        }
    }

    fn needs_instantiation(&self, definition: &ComponentDefinition) -> bool {
        if self.inner.singletons.contains(definition.name()) {
            return false;
        }
        definition.producer().is_some() || (definition.scope().is_singleton() && definition.is_lazy_init())
    }

    fn unsatisfied(&self, descriptor: &DependencyDescriptor, owner: &str, reason: &str) -> DiError {
        if owner.is_empty() {
            return DiError::NoSuchType(descriptor.element().name());
        }
        DiError::Unsatisfied {
            component: owner.to_string(),
            member: descriptor.display_name().to_string(),
            type_name: descriptor.element().name(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.inner.store.len())
            .field("singletons", &self.inner.singletons.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
