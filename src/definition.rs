//! Component definitions: the records held by the definition store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::key::{short_name, TypeKey};
use crate::lifetime::Lifetime;
use crate::marker::{QUALIFIER, VALUE_ATTRIBUTE};
use crate::producer::Producer;
use crate::value::{ConstructorArgumentValues, PropertyValues, Value, ValueHolder};

/// Explicit qualifier registered on a definition.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::QualifierSpec;
///
/// let q = QualifierSpec::named("mainDb");
/// assert_eq!(q.attribute("value"), Some("mainDb"));
/// assert!(q.matches_type("ferrous_wire::Qualifier"));
/// assert!(q.matches_type("Qualifier"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierSpec {
    type_name: String,
    attributes: BTreeMap<String, String>,
}

impl QualifierSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        QualifierSpec {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Built-in qualifier type with a `value` attribute.
    pub fn named(value: impl Into<String>) -> Self {
        QualifierSpec::new(QUALIFIER).attr(VALUE_ATTRIBUTE, value)
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Registered under `type_name`, given as full or short name.
    pub fn matches_type(&self, type_name: &str) -> bool {
        self.type_name == type_name || short_name(&self.type_name) == type_name
    }
}

/// Declarative description of one managed component.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ComponentDefinition, Lifetime, QualifierSpec, Value};
///
/// struct Pool;
///
/// let def = ComponentDefinition::of::<Pool>("pool")
///     .alias("dataSource")
///     .lifetime(Lifetime::Prototype)
///     .primary(true)
///     .qualifier(QualifierSpec::named("main"))
///     .property("size", Value::text("8"));
///
/// assert_eq!(def.name(), "pool");
/// assert!(def.is_primary());
/// assert_eq!(def.aliases(), ["dataSource".to_string()]);
/// ```
#[derive(Clone)]
pub struct ComponentDefinition {
    name: String,
    aliases: Vec<String>,
    type_key: TypeKey,
    producer: Option<Arc<dyn Producer>>,
    constructor_args: ConstructorArgumentValues,
    properties: PropertyValues,
    lifetime: Lifetime,
    lazy_init: bool,
    depends_on: Vec<String>,
    primary: bool,
    autowire_candidate: bool,
    qualifiers: Vec<QualifierSpec>,
    attributes: BTreeMap<String, String>,
}

impl ComponentDefinition {
    /// Definition built through the registered metadata of `T`.
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::with_type(name, TypeKey::of::<T>())
    }

    pub fn with_type(name: impl Into<String>, type_key: TypeKey) -> Self {
        ComponentDefinition {
            name: name.into(),
            aliases: Vec::new(),
            type_key,
            producer: None,
            constructor_args: ConstructorArgumentValues::new(),
            properties: PropertyValues::new(),
            lifetime: Lifetime::Singleton,
            lazy_init: false,
            depends_on: Vec::new(),
            primary: false,
            autowire_candidate: true,
            qualifiers: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Definition whose object is made by a delegating producer instead of a constructor.
    pub fn produced_by(name: impl Into<String>, producer: Arc<dyn Producer>) -> Self {
        let mut def = Self::with_type(name, producer.object_type());
        def.producer = Some(producer);
        def
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub(crate) fn set_aliases(&mut self, aliases: Vec<String>) {
        self.aliases = aliases;
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy_init = lazy;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    pub fn qualifier(mut self, qualifier: QualifierSpec) -> Self {
        self.qualifiers.retain(|q| q.type_name != qualifier.type_name);
        self.qualifiers.push(qualifier);
        self
    }

    /// Definition-level attribute, consulted by qualifier matching.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn constructor_arg(mut self, index: usize, value: Value) -> Self {
        self.constructor_args.add_indexed(index, ValueHolder::new(value));
        self
    }

    pub fn constructor_holder(mut self, index: usize, holder: ValueHolder) -> Self {
        self.constructor_args.add_indexed(index, holder);
        self
    }

    pub fn generic_arg(mut self, holder: ValueHolder) -> Self {
        self.constructor_args.add_generic(Arc::new(holder));
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.add(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn producer(&self) -> Option<&Arc<dyn Producer>> {
        self.producer.as_ref()
    }

    pub fn constructor_args(&self) -> &ConstructorArgumentValues {
        &self.constructor_args
    }

    pub fn properties(&self) -> &PropertyValues {
        &self.properties
    }

    pub fn scope(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate
    }

    /// Explicit qualifier registered under a full or short type name.
    pub fn find_qualifier(&self, type_name: &str) -> Option<&QualifierSpec> {
        self.qualifiers.iter().find(|q| q.matches_type(type_name))
    }

    pub fn qualifiers(&self) -> &[QualifierSpec] {
        &self.qualifiers
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("type", &self.type_key)
            .field("scope", &self.lifetime)
            .field("produced", &self.producer.is_some())
            .field("primary", &self.primary)
            .field("autowire_candidate", &self.autowire_candidate)
            .field("lazy_init", &self.lazy_init)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}
