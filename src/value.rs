//! Declared constructor-argument and property values.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::definition::ComponentDefinition;
use crate::key::{short_name, AnyArc, TypeKey};

/// Raw declared value, turned into an object by the [`ValueResolver`](crate::ValueResolver).
#[derive(Clone)]
pub enum Value {
    /// Already-built object, used as is when its type fits.
    Object(AnyArc),
    /// Literal text converted to the target type at population time.
    Text(String),
    /// Reference to another component by name.
    Reference(String),
    /// Anonymous inner definition, built fresh for each use.
    Nested(Box<ComponentDefinition>),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Value::Reference(name.into())
    }

    pub fn nested(definition: ComponentDefinition) -> Self {
        Value::Nested(Box::new(definition))
    }

    /// Whether the value can be used for `target` without conversion.
    pub(crate) fn is_assignable_to(&self, target: TypeKey) -> bool {
        match self {
            Value::Object(obj) => (**obj).type_id() == target.id(),
            Value::Text(_) => target == TypeKey::of::<String>(),
            Value::Reference(_) | Value::Nested(_) => false,
        }
    }

    fn content_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Nested(a), Value::Nested(b)) => {
                a.name() == b.name() && a.type_key() == b.type_key()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(_) => f.write_str("Object(..)"),
            Value::Text(text) => write!(f, "Text({:?})", text),
            Value::Reference(name) => write!(f, "Reference({:?})", name),
            Value::Nested(def) => write!(f, "Nested({})", def.type_key()),
        }
    }
}

/// One declared constructor argument or property value.
///
/// Holders compare by content through [`ValueHolder::content_equals`], while
/// collections of holders deduplicate by identity, so several holders with the
/// same content can coexist.
pub struct ValueHolder {
    value: Value,
    type_name: Option<String>,
    name: Option<String>,
    converted: OnceCell<AnyArc>,
}

impl ValueHolder {
    pub fn new(value: Value) -> Self {
        ValueHolder {
            value,
            type_name: None,
            name: None,
            converted: OnceCell::new(),
        }
    }

    /// Restricts matching to parameters of the given type (full or short name).
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Restricts matching to the parameter with the given name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn converted(&self) -> Option<&AnyArc> {
        self.converted.get()
    }

    pub(crate) fn cache_converted(&self, value: AnyArc) -> AnyArc {
        self.converted.get_or_init(|| value).clone()
    }

    pub fn content_equals(&self, other: &ValueHolder) -> bool {
        self.value.content_eq(&other.value)
            && self.type_name == other.type_name
            && self.name == other.name
    }

    fn matches_type(&self, target: TypeKey) -> bool {
        match &self.type_name {
            None => true,
            Some(declared) => declared == target.name() || declared == short_name(target.name()),
        }
    }

    fn matches_name(&self, requested: Option<&str>) -> bool {
        match (&self.name, requested) {
            (None, _) => true,
            (Some(own), Some(requested)) => own == requested,
            (Some(_), None) => false,
        }
    }
}

impl Clone for ValueHolder {
    fn clone(&self) -> Self {
        ValueHolder {
            value: self.value.clone(),
            type_name: self.type_name.clone(),
            name: self.name.clone(),
            converted: OnceCell::new(),
        }
    }
}

impl fmt::Debug for ValueHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHolder")
            .field("value", &self.value)
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .finish()
    }
}

pub(crate) fn holder_id(holder: &Arc<ValueHolder>) -> usize {
    Arc::as_ptr(holder) as usize
}

/// Constructor arguments: positional entries plus generic ones matched by type/name.
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, Arc<ValueHolder>>,
    generic: Vec<Arc<ValueHolder>>,
}

impl ConstructorArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value at `index`; a later value for the same index replaces the earlier one.
    pub fn add_indexed(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, Arc::new(holder));
    }

    /// Appends a generic value unless this very holder is already present.
    pub fn add_generic(&mut self, holder: Arc<ValueHolder>) {
        if !self.generic.iter().any(|h| Arc::ptr_eq(h, &holder)) {
            self.generic.push(holder);
        }
    }

    /// Copies `other` into `self`: indexed entries are overridden, generic ones appended
    /// unless the same holder is already present.
    pub fn merge(&mut self, other: &ConstructorArgumentValues) {
        for (index, holder) in &other.indexed {
            self.indexed.insert(*index, holder.clone());
        }
        for holder in &other.generic {
            self.add_generic(holder.clone());
        }
    }

    pub fn indexed(&self) -> &BTreeMap<usize, Arc<ValueHolder>> {
        &self.indexed
    }

    pub fn generic(&self) -> &[Arc<ValueHolder>] {
        &self.generic
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// Highest positional index plus one; the minimum constructor arity these values need.
    pub(crate) fn min_arity(&self) -> usize {
        let by_index = self.indexed.keys().next_back().map_or(0, |i| i + 1);
        by_index.max(self.len())
    }

    /// Value for parameter `index`: indexed match first, then the first unused generic match.
    pub(crate) fn argument_value(
        &self,
        index: usize,
        target: TypeKey,
        name: Option<&str>,
        used: &HashSet<usize>,
    ) -> Option<Arc<ValueHolder>> {
        if let Some(holder) = self.indexed.get(&index) {
            if holder.matches_type(target) && holder.matches_name(name) {
                return Some(holder.clone());
            }
        }
        self.generic
            .iter()
            .find(|holder| {
                if used.contains(&holder_id(holder)) {
                    return false;
                }
                if !holder.matches_name(name) || !holder.matches_type(target) {
                    return false;
                }
                if holder.type_name.is_none() && holder.name.is_none() {
                    return match &holder.value {
                        Value::Object(_) => holder.value.is_assignable_to(target),
                        Value::Text(_) => crate::convert::accepts_text(target),
                        Value::Reference(_) | Value::Nested(_) => true,
                    };
                }
                true
            })
            .cloned()
    }

    /// Any generic value not used yet.
    pub(crate) fn any_unused(&self, used: &HashSet<usize>) -> Option<Arc<ValueHolder>> {
        self.generic
            .iter()
            .find(|holder| holder.name.is_none() && !used.contains(&holder_id(holder)))
            .cloned()
    }
}

/// Ordered explicit property values.
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    entries: Vec<(String, ValueHolder)>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the value for `name`, keeping first-insertion order.
    pub fn add(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let holder = ValueHolder::new(value).with_name(name.clone());
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = holder;
        } else {
            self.entries.push((name, holder));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ValueHolder> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueHolder)> {
        self.entries.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
