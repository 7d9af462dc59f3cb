//! Component registry: the mutable builder that is frozen into a [`Container`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::ContainerConfig;
use crate::constructor::ConstructorSelector;
use crate::container::{Container, ContainerInner};
use crate::convert::{DefaultValueResolver, ValueResolver};
use crate::definition::ComponentDefinition;
use crate::error::{DiError, DiResult};
use crate::hooks::{DestructionHook, HookRegistry, InstanceHook};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::matcher::CandidateMatcher;
use crate::metadata::{Component, TypeMetadata};
use crate::observer::{ContainerObserver, Observers};
use crate::planner::InjectionPlanner;
use crate::scope::ScopeProvider;

pub mod store;

pub use store::DefinitionStore;

/// Collects definitions, type metadata, hooks and scopes, then builds a [`Container`].
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Component, ComponentDefinition, ComponentRegistry, Lifetime, TypeMetadata};
///
/// struct Session;
///
/// impl Component for Session {
///     fn metadata() -> TypeMetadata {
///         TypeMetadata::builder::<Session>().constructor(vec![], |_| Ok(Session)).build()
///     }
/// }
///
/// let mut registry = ComponentRegistry::new();
/// registry.register_type(Session::metadata());
/// registry
///     .register_definition(ComponentDefinition::of::<Session>("session").lifetime(Lifetime::Prototype))
///     .unwrap();
///
/// let container = registry.build().unwrap();
/// let a = container.get::<Session>().unwrap();
/// let b = container.get::<Session>().unwrap();
/// assert!(!std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub struct ComponentRegistry {
    store: DefinitionStore,
    metadata: HashMap<TypeKey, Arc<TypeMetadata>>,
    matcher: CandidateMatcher,
    hooks: HookRegistry,
    observers: Observers,
    scopes: HashMap<String, Arc<dyn ScopeProvider>>,
    value_resolver: Arc<dyn ValueResolver>,
    config: ContainerConfig,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry {
            store: DefinitionStore::new(),
            metadata: HashMap::new(),
            matcher: CandidateMatcher::new(),
            hooks: HookRegistry::default(),
            observers: Observers::new(),
            scopes: HashMap::new(),
            value_resolver: Arc::new(DefaultValueResolver),
            config: ContainerConfig::default(),
        }
    }

    /// Registers the metadata of `T` and a singleton definition named `name`.
    pub fn register<T: Component>(&mut self, name: impl Into<String>) -> DiResult<&mut Self> {
        self.register_type(T::metadata());
        self.register_definition(ComponentDefinition::of::<T>(name))
    }

    /// Registers type metadata; a later table for the same type replaces the earlier one.
    pub fn register_type(&mut self, metadata: TypeMetadata) -> &mut Self {
        self.metadata.insert(metadata.key(), Arc::new(metadata));
        self
    }

    pub fn register_definition(&mut self, definition: ComponentDefinition) -> DiResult<&mut Self> {
        self.store.register(definition)?;
        Ok(self)
    }

    pub fn register_alias(&mut self, name: &str, alias: &str) -> DiResult<&mut Self> {
        self.store.register_alias(name, alias)?;
        Ok(self)
    }

    pub fn add_hook(&mut self, hook: Arc<dyn InstanceHook>) -> &mut Self {
        self.hooks.add_instance_hook(hook);
        self
    }

    pub fn add_destruction_hook(&mut self, hook: Arc<dyn DestructionHook>) -> &mut Self {
        self.hooks.add_destruction_hook(hook);
        self
    }

    /// Makes `scope` serve every definition whose lifetime is `Custom(name)`.
    pub fn register_scope(&mut self, name: impl Into<String>, scope: Arc<dyn ScopeProvider>) -> DiResult<&mut Self> {
        let name = name.into();
        if name.is_empty() || Lifetime::parse(&name) != Lifetime::Custom(name.clone()) {
            return Err(DiError::config(name, "cannot replace the built-in singleton or prototype scope"));
        }
        self.scopes.insert(name, scope);
        Ok(self)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ContainerObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    pub fn with_config(&mut self, config: ContainerConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Recognizes markers of `type_name` as qualifiers, in addition to the built-in one.
    pub fn qualifier_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.matcher = std::mem::take(&mut self.matcher).with_qualifier_type(type_name);
        self
    }

    pub fn with_value_resolver(&mut self, resolver: Arc<dyn ValueResolver>) -> &mut Self {
        self.value_resolver = resolver;
        self
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.store
    }

    /// Validates the registrations, freezes the definition store and builds the container.
    ///
    /// Fails with a configuration error for a definition without metadata or with an
    /// unusable constructor set, an unregistered custom scope, a missing or circular
    /// `depends_on` entry. Non-lazy singletons are created here when the config asks
    /// for it.
    pub fn build(self) -> DiResult<Container> {
        self.validate()?;

        let mut store = self.store;
        store.freeze();
        debug!(definitions = store.len(), types = self.metadata.len(), "building container");

        let container = Container::from_inner(ContainerInner {
            store,
            metadata: self.metadata,
            matcher: self.matcher,
            planner: InjectionPlanner::new(),
            hooks: self.hooks,
            observers: self.observers,
            scopes: self.scopes,
            value_resolver: self.value_resolver,
            config: self.config,
            singletons: Default::default(),
            states: RwLock::new(HashMap::new()),
        });

        if container.config().pre_instantiate_on_build {
            container.pre_instantiate_singletons()?;
        }
        Ok(container)
    }

    fn validate(&self) -> DiResult<()> {
        for definition in self.store.iter() {
            let name = definition.name();
            if definition.producer().is_none() {
                let metadata = self.metadata.get(&definition.type_key()).ok_or_else(|| {
                    DiError::config(
                        name,
                        format!("no metadata registered for '{}'", definition.type_key()),
                    )
                })?;
                ConstructorSelector::select(metadata).map_err(|e| retarget(name, e))?;
            }
            if let Lifetime::Custom(scope) = definition.scope() {
                if !self.scopes.contains_key(scope) {
                    return Err(DiError::config(name, format!("no scope registered under '{}'", scope)));
                }
            }
            for dependency in definition.dependencies() {
                if !self.store.contains(dependency) {
                    return Err(DiError::config(
                        name,
                        format!("depends on undefined component '{}'", dependency),
                    ));
                }
            }
        }
        self.check_depends_on_cycles()
    }

    fn check_depends_on_cycles(&self) -> DiResult<()> {
        let mut done = HashSet::new();
        for name in self.store.names() {
            let mut path = Vec::new();
            self.visit_depends_on(name, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit_depends_on(
        &self,
        name: &str,
        path: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> DiResult<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|n| n == name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(DiError::config(
                name,
                format!("circular depends-on relationship: {}", cycle.join(" -> ")),
            ));
        }
        path.push(name.to_string());
        if let Some(definition) = self.store.get(name) {
            for dependency in definition.dependencies() {
                let canonical = self.store.canonical_name(dependency).to_string();
                self.visit_depends_on(&canonical, path, done)?;
            }
        }
        path.pop();
        done.insert(name.to_string());
        Ok(())
    }
}

/// Names the offending definition in configuration errors raised for its type.
fn retarget(name: &str, error: DiError) -> DiError {
    match error {
        DiError::Configuration { message, .. } => DiError::config(name, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Param;
    use crate::scope::MapScope;

    struct Repo;

    fn repo_meta() -> TypeMetadata {
        TypeMetadata::builder::<Repo>().constructor(vec![], |_| Ok(Repo)).build()
    }

    #[test]
    fn definition_without_metadata_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register_definition(ComponentDefinition::of::<Repo>("repo")).unwrap();
        let err = registry.build().unwrap_err();
        assert!(matches!(err, DiError::Configuration { ref component, .. } if component == "repo"));
    }

    #[test]
    fn broken_constructor_markers_fail_the_build() {
        let mut registry = ComponentRegistry::new();
        registry.register_type(
            TypeMetadata::builder::<Repo>()
                .autowired_constructor(true, vec![Param::of::<u8>()], |_| Ok(Repo))
                .autowired_constructor(true, vec![Param::of::<u16>()], |_| Ok(Repo))
                .build(),
        );
        registry.register_definition(ComponentDefinition::of::<Repo>("repo")).unwrap();
        let err = registry.build().unwrap_err();
        assert!(matches!(err, DiError::Configuration { ref component, .. } if component == "repo"));
    }

    #[test]
    fn depends_on_must_exist_and_be_acyclic() {
        let mut registry = ComponentRegistry::new();
        registry.register_type(repo_meta());
        registry
            .register_definition(ComponentDefinition::of::<Repo>("a").depends_on("missing"))
            .unwrap();
        assert!(registry.build().unwrap_err().is_configuration());

        let mut registry = ComponentRegistry::new();
        registry.register_type(repo_meta());
        registry
            .register_definition(ComponentDefinition::of::<Repo>("a").depends_on("b"))
            .unwrap();
        registry
            .register_definition(ComponentDefinition::of::<Repo>("b").depends_on("a"))
            .unwrap();
        let err = registry.build().unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn custom_scopes_must_be_registered() {
        let mut registry = ComponentRegistry::new();
        registry.register_type(repo_meta());
        registry
            .register_definition(
                ComponentDefinition::of::<Repo>("repo").lifetime(Lifetime::Custom("request".into())),
            )
            .unwrap();
        assert!(registry.build().unwrap_err().is_configuration());

        let mut registry = ComponentRegistry::new();
        assert!(registry
            .register_scope("singleton", Arc::new(MapScope::new("s")))
            .is_err());
        registry.register_scope("request", Arc::new(MapScope::new("r"))).unwrap();
    }
}
