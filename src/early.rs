//! Early references for components made by producers.
//!
//! While a producer-backed singleton is being made, a component that needs it on
//! the same creation path receives a [`Forwarder`] instead. The forwarder is bound
//! to the product once the producer returns; calls made through it before that
//! point fail with [`DiError::NotInitialized`], and calls from other threads
//! block until the product exists.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::error::{DiError, DiResult};
use crate::key::{AnyArc, TypeKey};
use crate::producer::Producer;

enum Slot<T: ?Sized> {
    Pending(ThreadId),
    Bound(Arc<T>),
    Abandoned,
}

/// Stand-in for an object that is still being produced.
///
/// Implement the exposed trait for `Forwarder<dyn Trait>` by delegating every
/// method to [`Forwarder::target`].
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{DiResult, Forwarder};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> DiResult<String>;
/// }
///
/// impl Greeter for Forwarder<dyn Greeter> {
///     fn greet(&self) -> DiResult<String> {
///         self.target()?.greet()
///     }
/// }
/// ```
pub struct Forwarder<T: ?Sized> {
    name: String,
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T: ?Sized> Forwarder<T> {
    pub(crate) fn new(name: &str, creator: ThreadId) -> Self {
        Forwarder {
            name: name.to_string(),
            slot: Mutex::new(Slot::Pending(creator)),
            ready: Condvar::new(),
        }
    }

    /// Name of the component this forwarder stands for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Bound(_))
    }

    /// The real object. Blocks while another thread is still producing it.
    pub fn target(&self) -> DiResult<Arc<T>> {
        let mut slot = self.slot.lock();
        loop {
            let elsewhere = match &*slot {
                Slot::Bound(target) => return Ok(target.clone()),
                Slot::Abandoned => false,
                Slot::Pending(creator) => *creator != thread::current().id(),
            };
            if !elsewhere {
                return Err(DiError::NotInitialized(self.name.clone()));
            }
            self.ready.wait(&mut slot);
        }
    }

    pub(crate) fn bind(&self, target: Arc<T>) {
        *self.slot.lock() = Slot::Bound(target);
        self.ready.notify_all();
    }

    pub(crate) fn abandon(&self) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending(_)) {
            *slot = Slot::Abandoned;
        }
        drop(slot);
        self.ready.notify_all();
    }
}

// Identity semantics; delegating would recurse through the target.
impl<T: ?Sized> PartialEq for Forwarder<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<T: ?Sized> Eq for Forwarder<T> {}

impl<T: ?Sized> Hash for Forwarder<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const Self as *const () as usize).hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Forwarder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.lock() {
            Slot::Pending(_) => "pending",
            Slot::Bound(_) => "bound",
            Slot::Abandoned => "abandoned",
        };
        f.debug_struct("Forwarder")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

pub(crate) trait EarlyBinding: Send + Sync {
    fn bind(&self, product: &AnyArc) -> DiResult<()>;
    fn abandon(&self);
}

struct TypedBinding<V: ?Sized> {
    forwarder: Arc<Forwarder<V>>,
    cast: CastFn<V>,
}

impl<V: ?Sized + Send + Sync + 'static> EarlyBinding for TypedBinding<V> {
    fn bind(&self, product: &AnyArc) -> DiResult<()> {
        let target = (self.cast)(product.clone())
            .ok_or(DiError::TypeMismatch(std::any::type_name::<V>()))?;
        self.forwarder.bind(target);
        Ok(())
    }

    fn abandon(&self) {
        self.forwarder.abandon();
    }
}

type CastFn<V> = Arc<dyn Fn(AnyArc) -> Option<Arc<V>> + Send + Sync>;
type ExposeFn = Arc<dyn Fn(&str, ThreadId) -> (AnyArc, Arc<dyn EarlyBinding>) + Send + Sync>;
type ViewFn = Arc<dyn Fn(AnyArc) -> Option<AnyArc> + Send + Sync>;

/// One trait a producer's object implements and an early reference may expose.
#[derive(Clone)]
pub struct Capability {
    key: TypeKey,
    expose: ExposeFn,
    view: ViewFn,
}

impl Capability {
    /// `forward` turns the forwarder into the trait object (usually `|f| f`);
    /// `cast` turns the finished product into the same trait object.
    pub fn new<V, C>(forward: fn(Arc<Forwarder<V>>) -> Arc<V>, cast: C) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        C: Fn(AnyArc) -> Option<Arc<V>> + Send + Sync + 'static,
    {
        let cast: CastFn<V> = Arc::new(cast);
        let view_cast = cast.clone();
        Capability {
            key: TypeKey::of::<V>(),
            expose: Arc::new(move |name, creator| {
                let forwarder = Arc::new(Forwarder::<V>::new(name, creator));
                let reference = Arc::new(forward(forwarder.clone())) as AnyArc;
                let binding = Arc::new(TypedBinding {
                    forwarder,
                    cast: cast.clone(),
                }) as Arc<dyn EarlyBinding>;
                (reference, binding)
            }),
            view: Arc::new(move |product| view_cast(product).map(|v| Arc::new(v) as AnyArc)),
        }
    }

    /// Capability for a producer whose object type is `V` itself.
    pub fn direct<V>(forward: fn(Arc<Forwarder<V>>) -> Arc<V>) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        Self::new::<V, _>(forward, |product| {
            crate::metadata::args::downcast_view::<V>(product).ok()
        })
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Product converted to the stored form of this capability's trait.
    pub(crate) fn view(&self, product: AnyArc) -> Option<AnyArc> {
        (self.view)(product)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key.name())
    }
}

/// Capabilities declared by a producer.
#[derive(Clone, Debug, Default)]
pub struct CapabilitySet {
    capabilities: Vec<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.push(capability);
        self
    }

    pub fn push(&mut self, capability: Capability) {
        self.capabilities.retain(|c| c.key != capability.key);
        self.capabilities.push(capability);
    }

    pub fn find(&self, key: TypeKey) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.capabilities.iter().map(|c| c.key)
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Early reference state of one producer-backed component in creation.
pub(crate) struct EarlyReference {
    name: String,
    creator: ThreadId,
    capabilities: CapabilitySet,
    exposed: Mutex<Vec<(TypeKey, AnyArc, Arc<dyn EarlyBinding>)>>,
}

impl EarlyReference {
    pub(crate) fn for_producer(name: &str, producer: &dyn Producer) -> DiResult<Self> {
        let capabilities = match producer.capabilities() {
            Some(set) if !set.is_empty() => set.clone(),
            _ => {
                return Err(DiError::config(
                    name,
                    "early reference requested but the producer declares no capability set",
                ))
            }
        };
        Ok(EarlyReference {
            name: name.to_string(),
            creator: thread::current().id(),
            capabilities,
            exposed: Mutex::new(Vec::new()),
        })
    }

    /// Forwarding reference stored as `key` expects; one per capability.
    pub(crate) fn reference(&self, key: TypeKey) -> DiResult<AnyArc> {
        let mut exposed = self.exposed.lock();
        if let Some((_, reference, _)) = exposed.iter().find(|(k, _, _)| *k == key) {
            return Ok(reference.clone());
        }
        let capability = self.capabilities.find(key).ok_or_else(|| {
            DiError::config(
                &self.name,
                format!("early reference cannot expose '{}'", key.name()),
            )
        })?;
        let (reference, binding) = (capability.expose)(&self.name, self.creator);
        exposed.push((key, reference.clone(), binding));
        Ok(reference)
    }

    pub(crate) fn was_exposed(&self) -> bool {
        !self.exposed.lock().is_empty()
    }

    pub(crate) fn complete(&self, product: &AnyArc) -> DiResult<()> {
        for (_, _, binding) in self.exposed.lock().iter() {
            binding.bind(product)?;
        }
        Ok(())
    }

    pub(crate) fn abandon(&self) {
        for (_, _, binding) in self.exposed.lock().iter() {
            binding.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::FnProducer;

    trait Greeter: Send + Sync {
        fn greet(&self) -> DiResult<String>;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> DiResult<String> {
            Ok("hello".into())
        }
    }

    impl Greeter for Forwarder<dyn Greeter> {
        fn greet(&self) -> DiResult<String> {
            self.target()?.greet()
        }
    }

    fn greeter_capability() -> Capability {
        Capability::direct::<dyn Greeter>(|f: Arc<Forwarder<dyn Greeter>>| -> Arc<dyn Greeter> { f })
    }

    fn producer() -> FnProducer {
        FnProducer::of_trait::<dyn Greeter, _>(|_| Ok(Arc::new(English) as Arc<dyn Greeter>))
            .exposing(greeter_capability())
    }

    #[test]
    fn producer_without_capabilities_is_a_configuration_error() {
        let bare = FnProducer::new(|_| Ok(English));
        let err = EarlyReference::for_producer("greeter", &bare).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn forwarder_fails_on_creating_thread_until_bound() {
        let early = EarlyReference::for_producer("greeter", &producer()).unwrap();
        let key = TypeKey::of::<dyn Greeter>();
        let reference = early.reference(key).unwrap();
        let greeter = crate::metadata::args::downcast_view::<dyn Greeter>(reference).unwrap();
        assert!(matches!(greeter.greet(), Err(DiError::NotInitialized(_))));

        let product: AnyArc = Arc::new(Arc::new(English) as Arc<dyn Greeter>);
        early.complete(&product).unwrap();
        assert_eq!(greeter.greet().unwrap(), "hello");
    }

    #[test]
    fn same_capability_yields_the_same_reference() {
        let early = EarlyReference::for_producer("greeter", &producer()).unwrap();
        let key = TypeKey::of::<dyn Greeter>();
        let a = early.reference(key).unwrap();
        let b = early.reference(key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(early.reference(TypeKey::of::<u32>()).is_err());
    }

    #[test]
    fn other_threads_block_until_bound() {
        let forwarder = Arc::new(Forwarder::<dyn Greeter>::new("greeter", thread::current().id()));
        let waiter = {
            let forwarder = forwarder.clone();
            thread::spawn(move || forwarder.target().map(|t| t.greet()))
        };
        forwarder.bind(Arc::new(English));
        let greeting = waiter.join().unwrap().unwrap().unwrap();
        assert_eq!(greeting, "hello");
    }

    #[test]
    fn abandoned_forwarder_reports_not_initialized() {
        let forwarder = Forwarder::<dyn Greeter>::new("greeter", thread::current().id());
        forwarder.abandon();
        assert!(matches!(forwarder.target(), Err(DiError::NotInitialized(_))));
        assert_eq!(forwarder, forwarder);
    }
}
