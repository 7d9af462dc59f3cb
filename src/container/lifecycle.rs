//! Lifecycle orchestration: creation pipeline per instance and teardown.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::{Container, ContainerInner};
use crate::constructor;
use crate::definition::ComponentDefinition;
use crate::error::{DiError, DiResult};
use crate::internal::CreationGuard;
use crate::key::AnyArc;
use crate::lifetime::Lifetime;
use crate::metadata::{project, TypeMetadata};
use crate::metadata::member::AnyMut;

/// Where an instance is in its lifecycle.
///
/// For prototype and custom-scoped components the state is that of the most
/// recently created instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Defined,
    Selecting,
    Instantiating,
    EarlyExposed,
    PropertyPopulation,
    Injecting,
    Initializing,
    Ready,
    Destroying,
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Container {
    /// Current state of component `name`; `Defined` until its first creation.
    pub fn lifecycle_state(&self, name: &str) -> DiResult<LifecycleState> {
        let canonical = self.canonical(name)?;
        Ok(self
            .inner
            .states
            .read()
            .get(&canonical)
            .copied()
            .unwrap_or(LifecycleState::Defined))
    }

    pub(crate) fn set_state(&self, name: &str, state: LifecycleState) {
        if self.inner.store.get(name).is_some_and(|d| d.name() == name) {
            self.inner.states.write().insert(name.to_string(), state);
        }
    }

    /// Instance of `canonical` according to its lifetime.
    pub(crate) fn get_instance(&self, canonical: &str) -> DiResult<AnyArc> {
        let definition = self.definition_arc(canonical)?;
        match definition.scope() {
            Lifetime::Singleton => self.get_singleton(canonical, &definition),
            Lifetime::Prototype => self.create(canonical, &definition),
            Lifetime::Custom(scope_name) => self.get_scoped(canonical, scope_name, &definition),
        }
    }

    fn get_singleton(&self, name: &str, definition: &ComponentDefinition) -> DiResult<AnyArc> {
        if let Some(instance) = self.inner.singletons.get(name) {
            return Ok(instance);
        }
        let _creation = self.inner.singletons.creation_lock();
        if let Some(instance) = self.inner.singletons.get(name) {
            return Ok(instance);
        }

        match self.create(name, definition) {
            Ok(instance) => {
                if let Some(early) = self.inner.singletons.take_early(name) {
                    if let Err(error) = early.complete(&instance) {
                        early.abandon();
                        self.discard_dependents(name);
                        return Err(DiError::creation(name, error));
                    }
                    debug!(component = %name, "early references bound to the finished instance");
                }
                self.inner.singletons.insert(name, instance.clone());
                Ok(instance)
            }
            Err(error) => {
                if let Some(early) = self.inner.singletons.take_early(name) {
                    early.abandon();
                }
                self.discard_dependents(name);
                Err(error)
            }
        }
    }

    fn get_scoped(&self, name: &str, scope_name: &str, definition: &ComponentDefinition) -> DiResult<AnyArc> {
        let scope = self
            .inner
            .scopes
            .get(scope_name)
            .cloned()
            .ok_or_else(|| DiError::Scope(format!("no scope registered under '{}'", scope_name)))?;
        scope.get(name, &mut || {
            let instance = self.create(name, definition)?;
            if self.needs_destruction(definition, &instance) {
                let weak: Weak<ContainerInner> = Arc::downgrade(&self.inner);
                let (owned_name, owned_instance) = (name.to_string(), instance.clone());
                scope.register_destruction_callback(
                    name,
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            Container { inner }.destroy_one(&owned_name, &owned_instance);
                        }
                    }),
                );
            }
            Ok(instance)
        })
    }

    /// Runs the full creation pipeline for one instance of `definition`.
    pub(crate) fn create(&self, name: &str, definition: &ComponentDefinition) -> DiResult<AnyArc> {
        let _guard = CreationGuard::enter(name, self.inner.config.max_creation_depth)?;
        let started = Instant::now();
        self.inner.observers.creating(name);

        match self.run_pipeline(name, definition) {
            Ok(instance) => {
                self.set_state(name, LifecycleState::Ready);
                self.inner.observers.created(name, started.elapsed());
                Ok(instance)
            }
            Err(error) => {
                let error = match error {
                    DiError::Creation { ref component, .. } if component == name => error,
                    other => DiError::creation(name, other),
                };
                self.set_state(name, LifecycleState::Defined);
                self.inner.observers.creation_failed(name, &error);
                Err(error)
            }
        }
    }

    fn run_pipeline(&self, name: &str, definition: &ComponentDefinition) -> DiResult<AnyArc> {
        for dependency in definition.dependencies() {
            let canonical = self.canonical(dependency)?;
            self.get_instance(&canonical)?;
            self.inner.singletons.register_dependent(&canonical, name);
        }

        match definition.producer() {
            Some(producer) => {
                self.set_state(name, LifecycleState::Instantiating);
                trace!(component = %name, "invoking producer");
                let product = producer.produce(self)?;
                match self.metadata_for(definition.type_key()).cloned() {
                    Some(metadata) => self.initialize(name, &metadata, product),
                    None => {
                        self.set_state(name, LifecycleState::Initializing);
                        let product = self.inner.hooks.before_init(name, product)?;
                        self.inner.hooks.after_init(name, product)
                    }
                }
            }
            None => {
                let metadata = self.metadata_for(definition.type_key()).cloned().ok_or_else(|| {
                    DiError::config(name, format!("no metadata registered for '{}'", definition.type_key()))
                })?;

                self.set_state(name, LifecycleState::Selecting);
                let (mut object, touched) = constructor::instantiate(self, name, definition, &metadata)?;
                self.set_state(name, LifecycleState::Instantiating);
                self.register_dependents(&touched, name);

                self.set_state(name, LifecycleState::PropertyPopulation);
                self.populate(name, definition, &metadata, object.as_mut())?;

                self.set_state(name, LifecycleState::Injecting);
                let plan = self.planner().plan_for(&metadata);
                self.planner().inject(self, &plan, object.as_mut(), name)?;

                let instance: AnyArc = Arc::from(object);
                self.initialize(name, &metadata, instance)
            }
        }
    }

    /// Applies explicit property values of `definition`.
    fn populate(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        metadata: &TypeMetadata,
        object: &mut AnyMut,
    ) -> DiResult<()> {
        for (property, holder) in definition.properties().iter() {
            let (path, meta) = metadata.find_property(property).ok_or_else(|| {
                DiError::config(
                    name,
                    format!("'{}' has no settable property '{}'", metadata.key().short_name(), property),
                )
            })?;
            let value = self
                .value_resolver()
                .resolve(self, name, holder, meta.target())
                .map_err(|e| DiError::member(name, property, e))?;
            let level = project(object, &path).ok_or(DiError::TypeMismatch(metadata.key().name()))?;
            meta.set(level, value)
                .map_err(|e| DiError::member(name, property, e))?;
            trace!(component = %name, property = %property, "property set");
        }
        Ok(())
    }

    fn initialize(&self, name: &str, metadata: &TypeMetadata, instance: AnyArc) -> DiResult<AnyArc> {
        self.set_state(name, LifecycleState::Initializing);
        let instance = self.inner.hooks.before_init(name, instance)?;
        metadata.run_init(&*instance)?;
        let instance = self.inner.hooks.after_init(name, instance)?;
        if (*instance).type_id() != metadata.key().id() {
            return Err(DiError::config(
                name,
                format!("an instance hook replaced '{}' with another type", metadata.key().short_name()),
            ));
        }
        Ok(instance)
    }

    /// Instantiates every non-lazy singleton; producer-backed ones first.
    pub fn pre_instantiate_singletons(&self) -> DiResult<()> {
        let (mut produced, mut constructed): (Vec<_>, Vec<_>) = self
            .inner
            .store
            .iter()
            .filter(|d| d.scope().is_singleton() && !d.is_lazy_init())
            .partition(|d| d.producer().is_some());
        produced.append(&mut constructed);

        debug!(count = produced.len(), "pre-instantiating singletons");
        for definition in produced {
            self.get_instance(definition.name())?;
        }
        Ok(())
    }

    fn needs_destruction(&self, definition: &ComponentDefinition, instance: &AnyArc) -> bool {
        self.inner.hooks.has_destruction_hooks(instance)
            || self
                .metadata_for(definition.type_key())
                .is_some_and(|m| m.has_destroy_callbacks())
    }

    /// Destroys every singleton, dependents before their dependencies.
    ///
    /// Failures are logged and never stop the teardown of other instances.
    pub fn destroy_singletons(&self) {
        let drained = {
            let _creation = self.inner.singletons.creation_lock();
            let order = self.inner.singletons.destruction_order();
            self.inner.singletons.drain(&order)
        };
        debug!(count = drained.len(), "destroying singletons");
        for (name, instance) in drained {
            self.destroy_one(&name, &instance);
        }
    }

    /// Like [`destroy_singletons`](Self::destroy_singletons), awaiting asynchronous
    /// disposal of each instance before its synchronous callbacks.
    pub async fn destroy_singletons_async(&self) {
        let drained = {
            let _creation = self.inner.singletons.creation_lock();
            let order = self.inner.singletons.destruction_order();
            self.inner.singletons.drain(&order)
        };
        debug!(count = drained.len(), "destroying singletons asynchronously");
        for (name, instance) in drained {
            let pending: Vec<_> = self
                .inner
                .store
                .get(&name)
                .and_then(|d| self.metadata_for(d.type_key()))
                .map(|m| m.async_destroy(&instance))
                .unwrap_or_default();
            for future in pending {
                future.await;
            }
            self.destroy_one(&name, &instance);
        }
    }

    /// Runs destruction callbacks for a prototype instance handed out earlier.
    pub fn destroy_instance(&self, name: &str, instance: &AnyArc) -> DiResult<()> {
        let canonical = self.canonical(name)?;
        self.destroy_one(&canonical, instance);
        Ok(())
    }

    /// Removes and destroys the finished singletons wired with `name`.
    fn discard_dependents(&self, name: &str) {
        for dependent in self.inner.singletons.dependents_of(name) {
            if let Some(instance) = self.inner.singletons.remove(&dependent) {
                debug!(component = %dependent, dependency = %name, "discarding dependent of failed component");
                self.discard_dependents(&dependent);
                self.destroy_one(&dependent, &instance);
            }
        }
    }

    pub(crate) fn destroy_one(&self, name: &str, instance: &AnyArc) {
        self.set_state(name, LifecycleState::Destroying);
        for error in self.inner.hooks.before_destroy(name, instance) {
            warn!(component = %name, error = %error, "destruction hook failed");
        }
        let metadata = self
            .inner
            .store
            .get(name)
            .and_then(|d| self.metadata_for(d.type_key()));
        if let Some(metadata) = metadata {
            for error in metadata.run_destroy(&**instance) {
                warn!(component = %name, error = %error, "destroy callback failed");
            }
        }
        self.set_state(name, LifecycleState::Destroyed);
        self.inner.observers.destroyed(name);
    }
}
