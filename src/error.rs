//! Error types for the component container.

use thiserror::Error;

/// Container errors
///
/// Configuration errors are raised for malformed definitions or metadata, resolution
/// errors for injection points that cannot be satisfied, and creation errors wrap any
/// failure that aborted the construction of one component.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ComponentRegistry, DiError};
///
/// let container = ComponentRegistry::new().build().unwrap();
/// match container.get_any("missing") {
///     Err(DiError::NoSuchComponent(name)) => assert_eq!(name, "missing"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Malformed definition or metadata (duplicate required constructors, marked
    /// zero-argument constructor, ambiguous qualifier, ...)
    #[error("Configuration error in '{component}': {message}")]
    Configuration { component: String, message: String },

    /// No definition registered under the name
    #[error("No component named '{0}' is defined")]
    NoSuchComponent(String),

    /// No candidate for a required type
    #[error("No component of type '{0}' is available")]
    NoSuchType(&'static str),

    /// Several equally eligible candidates and no tie-break
    #[error("Expected a single matching component of type '{type_name}' but found {}: {}", .candidates.len(), .candidates.join(", "))]
    NoUniqueComponent {
        type_name: &'static str,
        candidates: Vec<String>,
    },

    /// Required injection point without candidates
    #[error("Unsatisfied dependency '{member}' of type '{type_name}' in '{component}': {reason}")]
    Unsatisfied {
        component: String,
        member: String,
        type_name: &'static str,
        reason: String,
    },

    /// Construction of one component failed
    #[error("Error creating component '{component}': {source}")]
    Creation {
        component: String,
        #[source]
        source: Box<DiError>,
    },

    /// Failure while populating or injecting one member
    #[error("Error injecting '{member}' of '{component}': {source}")]
    Member {
        component: String,
        member: String,
        #[source]
        source: Box<DiError>,
    },

    /// Creation cycle that no early reference could break (includes path)
    #[error("Circular reference: {}", .0.join(" -> "))]
    Circular(Vec<String>),

    /// Requested component is still being built and cannot be exposed early
    #[error("Component '{0}' is currently in creation")]
    CurrentlyInCreation(String),

    /// Call through an early reference before the real object exists
    #[error("Component '{0}' is not initialized yet")]
    NotInitialized(String),

    /// Type downcast failed
    #[error("Type mismatch for '{0}'")]
    TypeMismatch(&'static str),

    /// Raw value could not be converted to the declared type
    #[error("Cannot convert value '{value}' to '{target}'")]
    Conversion { value: String, target: &'static str },

    /// Registry mutation after freeze
    #[error("Definition store is frozen; cannot register '{0}'")]
    Frozen(String),

    /// Custom scope failure
    #[error("Scope error: {0}")]
    Scope(String),

    /// Maximum nested creation depth exceeded
    #[error("Max creation depth {0} exceeded")]
    DepthExceeded(usize),
}

impl DiError {
    pub(crate) fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        DiError::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub(crate) fn creation(component: impl Into<String>, source: DiError) -> Self {
        DiError::Creation {
            component: component.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn member(
        component: impl Into<String>,
        member: impl Into<String>,
        source: DiError,
    ) -> Self {
        DiError::Member {
            component: component.into(),
            member: member.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error below creation and member wrappers.
    pub fn root_cause(&self) -> &DiError {
        let mut current = self;
        loop {
            match current {
                DiError::Creation { source, .. } | DiError::Member { source, .. } => current = source,
                other => return other,
            }
        }
    }

    /// True for the configuration class of errors (at any wrapping depth).
    pub fn is_configuration(&self) -> bool {
        matches!(self.root_cause(), DiError::Configuration { .. })
    }
}

/// Result type for container operations
pub type DiResult<T> = Result<T, DiError>;
