//! Type metadata: the introspection capability the container relies on.
//!
//! Rust has no runtime reflection, so every managed type describes itself once
//! through [`TypeMetadata::builder`]: its constructors, injectable fields and
//! methods, settable properties, the trait views it can be used as, its ancestor
//! levels, and its lifecycle callbacks.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::BoxFutureUnit;
use crate::key::{AnyArc, TypeKey};
use crate::marker::Marker;
use crate::traits::{AsyncDispose, Dispose};

pub mod args;
pub mod member;

pub use args::{Args, Resolved};
pub use member::{ConstructorMeta, MemberKind, MemberMeta, Param, PropertyMeta, Shape};

use member::{AnyMut, ErasedLens, TypedLens};

pub(crate) type LensPath = Vec<Arc<dyn ErasedLens>>;

/// Follows `path` from the most derived value down to an ancestor level.
pub(crate) fn project<'a>(target: &'a mut AnyMut, path: &[Arc<dyn ErasedLens>]) -> Option<&'a mut AnyMut> {
    let mut current = target;
    for lens in path {
        current = lens.project(current)?;
    }
    Some(current)
}

/// Shared counterpart of [`project`].
pub(crate) fn project_ref<'a>(target: &'a AnyMut, path: &[Arc<dyn ErasedLens>]) -> Option<&'a AnyMut> {
    let mut current = target;
    for lens in path {
        current = lens.view(current)?;
    }
    Some(current)
}

type CastFn = Arc<dyn Fn(AnyArc) -> Option<AnyArc> + Send + Sync>;
pub(crate) type Callback = Arc<dyn Fn(&AnyMut) -> DiResult<()> + Send + Sync>;
pub(crate) type AsyncCallback = Arc<dyn Fn(AnyArc, LensPath) -> Option<BoxFutureUnit> + Send + Sync>;

/// Types that describe themselves to the container.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Component, ComponentRegistry, TypeMetadata};
///
/// struct Clock;
///
/// impl Component for Clock {
///     fn metadata() -> TypeMetadata {
///         TypeMetadata::builder::<Clock>()
///             .constructor(vec![], |_| Ok(Clock))
///             .build()
///     }
/// }
///
/// let mut registry = ComponentRegistry::new();
/// registry.register::<Clock>("clock").unwrap();
/// let container = registry.build().unwrap();
/// assert!(container.get::<Clock>().is_ok());
/// ```
pub trait Component: Any + Send + Sync + Sized {
    fn metadata() -> TypeMetadata;
}

/// A trait (or other type) instances of this type can be used as.
#[derive(Clone)]
pub struct View {
    key: TypeKey,
    cast: CastFn,
}

impl View {
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn cast(&self, instance: AnyArc) -> Option<AnyArc> {
        (self.cast)(instance)
    }
}

/// Ancestor level of a type, reached through a lens.
#[derive(Clone)]
pub(crate) struct ParentLevel {
    pub(crate) metadata: Arc<TypeMetadata>,
    pub(crate) lens: Arc<dyn ErasedLens>,
}

/// Static descriptor table of one type.
#[derive(Clone)]
pub struct TypeMetadata {
    key: TypeKey,
    markers: Vec<Marker>,
    constructors: Vec<ConstructorMeta>,
    members: Vec<MemberMeta>,
    properties: Vec<PropertyMeta>,
    views: Vec<View>,
    parent: Option<ParentLevel>,
    init: Vec<Callback>,
    destroy: Vec<Callback>,
    async_destroy: Vec<AsyncCallback>,
}

impl TypeMetadata {
    pub fn builder<T: Any + Send + Sync>() -> TypeMetadataBuilder<T> {
        TypeMetadataBuilder {
            meta: TypeMetadata {
                key: TypeKey::of::<T>(),
                markers: Vec::new(),
                constructors: Vec::new(),
                members: Vec::new(),
                properties: Vec::new(),
                views: Vec::new(),
                parent: None,
                init: Vec::new(),
                destroy: Vec::new(),
                async_destroy: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Markers declared on the type itself.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn constructors(&self) -> &[ConstructorMeta] {
        &self.constructors
    }

    /// Members declared at this level only.
    pub fn members(&self) -> &[MemberMeta] {
        &self.members
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// Whether instances can be used as `target` (the type itself or a declared view).
    pub fn is_assignable_to(&self, target: TypeKey) -> bool {
        self.key == target || self.views.iter().any(|v| v.key == target)
    }

    /// Converts an instance of this type to the representation stored for `target`.
    pub(crate) fn view_as(&self, instance: AnyArc, target: TypeKey) -> DiResult<AnyArc> {
        if self.key == target {
            return Ok(instance);
        }
        self.views
            .iter()
            .find(|v| v.key == target)
            .and_then(|v| v.cast(instance))
            .ok_or(DiError::TypeMismatch(target.name()))
    }

    pub(crate) fn parent(&self) -> Option<&ParentLevel> {
        self.parent.as_ref()
    }

    /// This level and its ancestors, most derived first, each with its lens path.
    pub(crate) fn levels(&self) -> Vec<(LensPath, &TypeMetadata)> {
        let mut levels = vec![(Vec::new(), self)];
        let mut path: LensPath = Vec::new();
        let mut current = self;
        while let Some(parent) = current.parent() {
            path.push(parent.lens.clone());
            levels.push((path.clone(), &*parent.metadata));
            current = &*parent.metadata;
        }
        levels
    }

    /// Property declared at this level or the nearest ancestor declaring it.
    pub(crate) fn find_property(&self, name: &str) -> Option<(LensPath, &PropertyMeta)> {
        self.levels()
            .into_iter()
            .find_map(|(path, level)| level.property(name).map(|p| (path, p)))
    }

    /// Runs the init callbacks of every level, ancestors first.
    pub(crate) fn run_init(&self, instance: &AnyMut) -> DiResult<()> {
        for (path, level) in self.levels().into_iter().rev() {
            let target = project_ref(instance, &path).ok_or(DiError::TypeMismatch(level.key.name()))?;
            for callback in &level.init {
                callback(target)?;
            }
        }
        Ok(())
    }

    /// Runs the destroy callbacks of every level, most derived first.
    ///
    /// A failing callback does not stop the others; every failure is returned.
    pub(crate) fn run_destroy(&self, instance: &AnyMut) -> Vec<DiError> {
        let mut errors = Vec::new();
        for (path, level) in self.levels() {
            let Some(target) = project_ref(instance, &path) else {
                errors.push(DiError::TypeMismatch(level.key.name()));
                continue;
            };
            errors.extend(level.destroy.iter().filter_map(|callback| callback(target).err()));
        }
        errors
    }

    /// Asynchronous disposals of every level, most derived first.
    pub(crate) fn async_destroy(&self, instance: &AnyArc) -> Vec<BoxFutureUnit> {
        let mut pending = Vec::new();
        for (path, level) in self.levels() {
            for callback in &level.async_destroy {
                pending.extend(callback(instance.clone(), path.clone()));
            }
        }
        pending
    }

    pub(crate) fn has_destroy_callbacks(&self) -> bool {
        self.levels()
            .iter()
            .any(|(_, level)| !level.destroy.is_empty() || !level.async_destroy.is_empty())
    }
}

impl std::fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("key", &self.key)
            .field("constructors", &self.constructors.len())
            .field("members", &self.members)
            .field("views", &self.views.iter().map(|v| v.key).collect::<Vec<_>>())
            .field("parent", &self.parent.as_ref().map(|p| p.metadata.key))
            .finish()
    }
}

/// Typed builder for [`TypeMetadata`].
pub struct TypeMetadataBuilder<T> {
    meta: TypeMetadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeMetadataBuilder<T> {
    pub fn marker(mut self, marker: Marker) -> Self {
        self.meta.markers.push(marker);
        self
    }

    /// Unmarked constructor.
    pub fn constructor<F>(mut self, params: Vec<Param>, build: F) -> Self
    where
        F: Fn(&mut Args) -> DiResult<T> + Send + Sync + 'static,
    {
        self.meta.constructors.push(ConstructorMeta::new(params, build));
        self
    }

    /// Constructor carrying an injection marker.
    pub fn autowired_constructor<F>(mut self, required: bool, params: Vec<Param>, build: F) -> Self
    where
        F: Fn(&mut Args) -> DiResult<T> + Send + Sync + 'static,
    {
        self.meta
            .constructors
            .push(ConstructorMeta::new(params, build).marked(Marker::autowired(required)));
        self
    }

    pub fn constructor_meta(mut self, ctor: ConstructorMeta) -> Self {
        self.meta.constructors.push(ctor);
        self
    }

    pub fn member(mut self, member: MemberMeta) -> Self {
        self.meta.members.push(member);
        self
    }

    /// Injected field; optionality follows the param.
    pub fn autowired_field<F>(self, name: &str, param: Param, set: F) -> Self
    where
        F: Fn(&mut T, &mut Args) -> DiResult<()> + Send + Sync + 'static,
    {
        let required = param.is_required();
        self.member(MemberMeta::field::<T, F>(name, param, set).autowired(required))
    }

    /// Injected method.
    pub fn autowired_method<F>(self, name: &str, params: Vec<Param>, call: F) -> Self
    where
        F: Fn(&mut T, &mut Args) -> DiResult<()> + Send + Sync + 'static,
    {
        self.member(MemberMeta::method::<T, F>(name, params, call).autowired(true))
    }

    /// Property set from explicit definition values of type `V`.
    pub fn property<V, F>(mut self, name: &str, set: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        self.meta.properties.push(PropertyMeta::value::<T, V, F>(name, set));
        self
    }

    /// Property holding a trait object.
    pub fn property_view<V, F>(mut self, name: &str, set: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        self.meta.properties.push(PropertyMeta::view::<T, V, F>(name, set));
        self
    }

    /// Declares that instances can be used as `V` (typically `dyn Trait`).
    pub fn view<V, F>(mut self, cast: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<V> + Send + Sync + 'static,
    {
        self.meta.views.push(View {
            key: TypeKey::of::<V>(),
            cast: Arc::new(move |instance| {
                let concrete = instance.downcast::<T>().ok()?;
                Some(Arc::new(cast(concrete)) as AnyArc)
            }),
        });
        self
    }

    /// Adds the ancestor level `P`, embedded in `T`.
    ///
    /// Injection and properties reach the level through `lens`. Its lifecycle
    /// callbacks see it through `view`: init callbacks run ancestors first and
    /// destroy callbacks run most derived first.
    pub fn parent<P: Any + Send + Sync>(
        mut self,
        metadata: TypeMetadata,
        view: fn(&T) -> &P,
        lens: fn(&mut T) -> &mut P,
    ) -> Self {
        self.meta.parent = Some(ParentLevel {
            metadata: Arc::new(metadata),
            lens: Arc::new(TypedLens {
                view,
                lens,
                _marker: PhantomData,
            }),
        });
        self
    }

    /// Initialization callback, run after injection and before the after-init hooks.
    pub fn on_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.meta.init.push(typed_callback::<T, F>(f));
        self
    }

    /// Destruction callback.
    pub fn on_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.meta.destroy.push(typed_callback::<T, F>(f));
        self
    }

    pub fn build(self) -> TypeMetadata {
        self.meta
    }
}

impl<T: Dispose> TypeMetadataBuilder<T> {
    /// Runs [`Dispose::dispose`] on destruction.
    pub fn disposable(self) -> Self {
        self.on_destroy(|t: &T| {
            t.dispose();
            Ok(())
        })
    }
}

impl<T: AsyncDispose> TypeMetadataBuilder<T> {
    /// Runs [`AsyncDispose::dispose`] during asynchronous teardown.
    pub fn async_disposable(mut self) -> Self {
        self.meta.async_destroy.push(Arc::new(|instance: AnyArc, path: LensPath| {
            project_ref(&*instance, &path)?.downcast_ref::<T>()?;
            Some(Box::pin(async move {
                let this = project_ref(&*instance, &path).and_then(|level| level.downcast_ref::<T>());
                if let Some(this) = this {
                    this.dispose().await;
                }
            }) as BoxFutureUnit)
        }));
        self
    }
}

fn typed_callback<T, F>(f: F) -> Callback
where
    T: Any + Send + Sync,
    F: Fn(&T) -> DiResult<()> + Send + Sync + 'static,
{
    Arc::new(move |instance: &AnyMut| {
        let this = instance
            .downcast_ref::<T>()
            .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))?;
        f(this)
    })
}
