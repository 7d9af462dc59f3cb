//! Component lifetimes (scopes).

use std::fmt;

/// Sharing policy for instances of a definition
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::Lifetime;
///
/// assert_eq!(Lifetime::parse("singleton"), Lifetime::Singleton);
/// assert_eq!(Lifetime::parse(""), Lifetime::Singleton);
/// assert_eq!(Lifetime::parse("prototype"), Lifetime::Prototype);
/// assert_eq!(Lifetime::parse("request"), Lifetime::Custom("request".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// One instance per container, created at most once and cached
    #[default]
    Singleton,
    /// New instance per request, never cached; destruction is up to the owner
    Prototype,
    /// Instances stored by a registered [`ScopeProvider`](crate::ScopeProvider)
    Custom(String),
}

impl Lifetime {
    /// Parses a declarative scope name; the empty string means singleton.
    pub fn parse(name: &str) -> Self {
        match name {
            "" | "singleton" => Lifetime::Singleton,
            "prototype" => Lifetime::Prototype,
            other => Lifetime::Custom(other.to_string()),
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self, Lifetime::Prototype)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => f.write_str("singleton"),
            Lifetime::Prototype => f.write_str("prototype"),
            Lifetime::Custom(name) => f.write_str(name),
        }
    }
}
