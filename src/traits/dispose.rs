//! Teardown contracts for managed components.
//!
//! A type opts in through its metadata: [`disposable()`](crate::TypeMetadataBuilder::disposable)
//! turns [`Dispose::dispose`] into a destroy callback, and
//! [`async_disposable()`](crate::TypeMetadataBuilder::async_disposable) registers
//! [`AsyncDispose::dispose`]. Destroy callbacks run when the container tears its singletons
//! down (dependents before their dependencies), when a custom scope ends, or when a prototype
//! is handed back through [`Container::destroy_instance`](crate::Container::destroy_instance).
//! Asynchronous disposal only runs from
//! [`Container::destroy_singletons_async`](crate::Container::destroy_singletons_async).

/// Synchronous release of whatever a component holds.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{ComponentDefinition, ComponentRegistry, Dispose, TypeMetadata};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct Cache {
///     flushed: Arc<AtomicBool>,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let flushed = Arc::new(AtomicBool::new(false));
/// let flag = flushed.clone();
/// let mut registry = ComponentRegistry::new();
/// registry.register_type(
///     TypeMetadata::builder::<Cache>()
///         .constructor(vec![], move |_| Ok(Cache { flushed: flag.clone() }))
///         .disposable()
///         .build(),
/// );
/// registry.register_definition(ComponentDefinition::of::<Cache>("cache")).unwrap();
/// let container = registry.build().unwrap();
///
/// container.get::<Cache>().unwrap();
/// container.destroy_singletons();
/// assert!(flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// Asynchronous counterpart of [`Dispose`].
///
/// Awaited for each singleton before its synchronous destroy callbacks. A plain
/// [`Container::destroy_singletons`](crate::Container::destroy_singletons) skips it.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{AsyncDispose, TypeMetadata};
/// use async_trait::async_trait;
///
/// struct ConnectionPool {
///     url: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for ConnectionPool {
///     async fn dispose(&self) {
///         tracing::debug!(url = %self.url, "draining pool");
///     }
/// }
///
/// let meta = TypeMetadata::builder::<ConnectionPool>()
///     .constructor(vec![], |_| Ok(ConnectionPool { url: "pg://primary".into() }))
///     .async_disposable()
///     .build();
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    async fn dispose(&self);
}
