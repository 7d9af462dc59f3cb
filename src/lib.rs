//! # ferrous-wire
//!
//! Definition-driven component container: constructs and wires a graph of managed
//! instances from declarative definitions, resolving dependencies by type, name and
//! qualifier.
//!
//! ## Features
//!
//! - **Autowiring**: constructor, field and method injection driven by type metadata
//! - **Qualifiers**: marker-based candidate matching with primary and name tie-breaks
//! - **Cached plans**: injection plans are built once per type and replayed with shortcuts
//! - **Circular references**: producer-backed singletons hand out early forwarding references
//! - **Lifecycle**: ordered instance hooks, init and destroy callbacks, dependents torn down first
//! - **Scopes**: singleton, prototype and custom scopes backed by a [`ScopeProvider`]
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_wire::{Component, ComponentRegistry, Param, TypeMetadata};
//! use std::sync::Arc;
//!
//! trait Writer: Send + Sync {
//!     fn write(&self, line: &str) -> String;
//! }
//!
//! struct Console;
//!
//! impl Writer for Console {
//!     fn write(&self, line: &str) -> String {
//!         format!("> {}", line)
//!     }
//! }
//!
//! struct Logger {
//!     writer: Arc<dyn Writer>,
//! }
//!
//! impl Component for Console {
//!     fn metadata() -> TypeMetadata {
//!         TypeMetadata::builder::<Console>()
//!             .constructor(vec![], |_| Ok(Console))
//!             .view::<dyn Writer, _>(|c: Arc<Console>| -> Arc<dyn Writer> { c })
//!             .build()
//!     }
//! }
//!
//! impl Component for Logger {
//!     fn metadata() -> TypeMetadata {
//!         TypeMetadata::builder::<Logger>()
//!             .constructor(vec![Param::of::<dyn Writer>()], |args| {
//!                 Ok(Logger { writer: args.get_trait::<dyn Writer>(0)? })
//!             })
//!             .build()
//!     }
//! }
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Console>("console").unwrap();
//! registry.register::<Logger>("logger").unwrap();
//!
//! let container = registry.build().unwrap();
//! let logger = container.get::<Logger>().unwrap();
//! assert_eq!(logger.writer.write("hi"), "> hi");
//! ```
//!
//! ## Lifetimes
//!
//! - **Singleton**: created at most once per container and cached
//! - **Prototype**: created on every request; destruction is up to the caller
//! - **Custom**: stored by the [`ScopeProvider`] registered under the scope name

// Module declarations
pub mod config;
pub mod constructor;
pub mod container;
pub mod convert;
pub mod definition;
pub mod descriptor;
pub mod early;
pub mod error;
pub mod hooks;
pub mod key;
pub mod lifetime;
pub mod marker;
pub mod matcher;
pub mod metadata;
pub mod observer;
pub mod planner;
pub mod producer;
pub mod registry;
pub mod scope;
pub mod traits;
pub mod value;

// Internal modules
mod internal;

// Re-exports
pub use config::{
    ConfigProvider, ConfigSource, ConfigValue, ContainerConfig, EnvironmentConfigSource,
    MapConfigSource,
};
pub use constructor::ConstructorSelector;
pub use container::{Container, LifecycleState};
pub use convert::{convert_text, DefaultValueResolver, ValueResolver};
pub use definition::{ComponentDefinition, QualifierSpec};
pub use descriptor::DependencyDescriptor;
pub use early::{Capability, CapabilitySet, Forwarder};
pub use error::{DiError, DiResult};
pub use hooks::{DestructionHook, InstanceHook};
pub use key::{key_of_type, AnyArc, TypeKey};
pub use lifetime::Lifetime;
pub use marker::{Marker, AUTOWIRED, QUALIFIER, VALUE, VALUE_ATTRIBUTE};
pub use matcher::CandidateMatcher;
pub use metadata::{
    Args, Component, ConstructorMeta, MemberKind, MemberMeta, Param, PropertyMeta, Resolved,
    Shape, TypeMetadata, TypeMetadataBuilder,
};
pub use observer::{ContainerObserver, TracingObserver};
pub use planner::{InjectionPlan, InjectionPlanner, PlanEntry};
pub use producer::{FnProducer, Producer};
pub use registry::{ComponentRegistry, DefinitionStore};
pub use scope::{MapScope, ObjectFactory, ScopeProvider};
pub use traits::{AsyncDispose, Dispose};
pub use value::{ConstructorArgumentValues, PropertyValues, Value, ValueHolder};
