//! Declarative markers attached to types, constructors, members and parameters.
//!
//! A marker is the container's stand-in for an annotation: a type name, an
//! attribute map, the declared attribute defaults, and optional meta markers
//! (markers carried by the marker type itself, used for custom qualifier types).

use std::collections::BTreeMap;

use crate::key::short_name;

/// Type name of the built-in qualifier marker.
pub const QUALIFIER: &str = "ferrous_wire::Qualifier";
/// Type name of the built-in default-value marker.
pub const VALUE: &str = "ferrous_wire::Value";
/// Type name of the built-in injection marker.
pub const AUTOWIRED: &str = "ferrous_wire::Autowired";

/// Conventional attribute holding a marker's main value.
pub const VALUE_ATTRIBUTE: &str = "value";
const REQUIRED_ATTRIBUTE: &str = "required";

#[derive(Debug, Clone)]
pub struct Marker {
    type_name: String,
    attributes: BTreeMap<String, String>,
    defaults: BTreeMap<String, String>,
    meta: Vec<Marker>,
}

impl Marker {
    pub fn new(type_name: impl Into<String>) -> Self {
        Marker {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
            defaults: BTreeMap::new(),
            meta: Vec::new(),
        }
    }

    /// Built-in qualifier with a `value` attribute.
    ///
    /// ```rust
    /// use ferrous_wire::Marker;
    ///
    /// let m = Marker::qualifier("primaryDb");
    /// assert_eq!(m.attribute("value"), Some("primaryDb"));
    /// assert_eq!(m.short_name(), "Qualifier");
    /// ```
    pub fn qualifier(value: impl Into<String>) -> Self {
        Marker::new(QUALIFIER)
            .default_attr(VALUE_ATTRIBUTE, "")
            .attr(VALUE_ATTRIBUTE, value)
    }

    /// Built-in qualifier without a value.
    pub fn bare_qualifier() -> Self {
        Marker::new(QUALIFIER)
    }

    /// Default-value expression marker.
    pub fn value(expression: impl Into<String>) -> Self {
        Marker::new(VALUE).attr(VALUE_ATTRIBUTE, expression)
    }

    /// Injection marker; `required = false` makes the point optional.
    pub fn autowired(required: bool) -> Self {
        Marker::new(AUTOWIRED)
            .default_attr(REQUIRED_ATTRIBUTE, "true")
            .attr(REQUIRED_ATTRIBUTE, required.to_string())
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Declares an attribute default, used when the attribute is not set explicitly.
    pub fn default_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Adds a marker carried by this marker's type.
    pub fn meta(mut self, marker: Marker) -> Self {
        self.meta.push(marker);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn short_name(&self) -> &str {
        short_name(&self.type_name)
    }

    pub fn is(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    /// Explicit value, falling back to the declared default.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .or_else(|| self.defaults.get(name))
            .map(String::as_str)
    }

    pub fn default_value(&self, name: &str) -> Option<&str> {
        self.defaults.get(name).map(String::as_str)
    }

    /// All attributes with defaults applied, in name order.
    pub fn effective_attributes(&self) -> BTreeMap<&str, &str> {
        let mut merged: BTreeMap<&str, &str> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (k, v) in &self.attributes {
            merged.insert(k.as_str(), v.as_str());
        }
        merged
    }

    pub fn meta_markers(&self) -> &[Marker] {
        &self.meta
    }

    /// `required` flag of an injection marker (true unless set otherwise).
    pub fn is_required(&self) -> bool {
        self.attribute(REQUIRED_ATTRIBUTE) != Some("false")
    }
}

/// Markers are equal when type and effective attributes are equal.
impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.effective_attributes() == other.effective_attributes()
    }
}

impl Eq for Marker {}
