//! Constructor, member and property descriptors of a type.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{AnyArc, TypeKey};
use crate::marker::{Marker, AUTOWIRED};
use crate::metadata::args::Args;

pub(crate) type AnyMut = dyn Any + Send + Sync;

/// Shape of an injection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One instance.
    Single,
    /// Every matching instance, in registration order.
    Collection,
    /// Every matching instance keyed by component name.
    Map,
}

/// Declared parameter (or field type) of an injectable member.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Marker, Param, Shape};
///
/// trait Writer {}
///
/// let p = Param::collection_of::<dyn Writer>()
///     .named("writers")
///     .marker(Marker::qualifier("fast"));
/// assert_eq!(p.shape(), Shape::Collection);
/// assert!(p.is_required());
/// assert!(!Param::of::<u32>().optional().is_required());
/// ```
#[derive(Debug, Clone)]
pub struct Param {
    name: Option<String>,
    element: TypeKey,
    shape: Shape,
    required: bool,
    markers: Vec<Marker>,
}

impl Param {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Param {
            name: None,
            element: TypeKey::of::<T>(),
            shape: Shape::Single,
            required: true,
            markers: Vec::new(),
        }
    }

    pub fn collection_of<T: ?Sized + 'static>() -> Self {
        Param {
            shape: Shape::Collection,
            ..Param::of::<T>()
        }
    }

    pub fn map_of<T: ?Sized + 'static>() -> Self {
        Param {
            shape: Shape::Map,
            ..Param::of::<T>()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn element(&self) -> TypeKey {
        self.element
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

type BuildFn = Arc<dyn Fn(&mut Args) -> DiResult<Box<AnyMut>> + Send + Sync>;
type ApplyFn = Arc<dyn Fn(&mut AnyMut, &mut Args) -> DiResult<()> + Send + Sync>;
type SetFn = Arc<dyn Fn(&mut AnyMut, AnyArc) -> DiResult<()> + Send + Sync>;

/// One way of constructing `T`.
#[derive(Clone)]
pub struct ConstructorMeta {
    params: Vec<Param>,
    marker: Option<Marker>,
    build: BuildFn,
}

impl ConstructorMeta {
    pub fn new<T, F>(params: Vec<Param>, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut Args) -> DiResult<T> + Send + Sync + 'static,
    {
        ConstructorMeta {
            params,
            marker: None,
            build: Arc::new(move |args| build(args).map(|t| Box::new(t) as Box<AnyMut>)),
        }
    }

    /// Attaches an injection marker (see [`Marker::autowired`]).
    pub fn marked(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    pub(crate) fn invoke(&self, args: &mut Args) -> DiResult<Box<AnyMut>> {
        (self.build)(args)
    }
}

impl std::fmt::Debug for ConstructorMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorMeta")
            .field("params", &self.params)
            .field("marker", &self.marker)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

/// A field or method that may receive injected values.
#[derive(Clone)]
pub struct MemberMeta {
    name: String,
    kind: MemberKind,
    params: Vec<Param>,
    markers: Vec<Marker>,
    is_static: bool,
    apply: ApplyFn,
}

impl MemberMeta {
    /// Field of `T`; the setter receives the resolved value at slot 0.
    pub fn field<T, F>(name: impl Into<String>, param: Param, set: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, &mut Args) -> DiResult<()> + Send + Sync + 'static,
    {
        Self::erased::<T, F>(name.into(), MemberKind::Field, vec![param], set)
    }

    /// Method of `T` taking zero or more injected parameters.
    pub fn method<T, F>(name: impl Into<String>, params: Vec<Param>, call: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, &mut Args) -> DiResult<()> + Send + Sync + 'static,
    {
        Self::erased::<T, F>(name.into(), MemberKind::Method, params, call)
    }

    fn erased<T, F>(name: String, kind: MemberKind, params: Vec<Param>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, &mut Args) -> DiResult<()> + Send + Sync + 'static,
    {
        MemberMeta {
            name,
            kind,
            params,
            markers: Vec::new(),
            is_static: false,
            apply: Arc::new(move |target, args| {
                let this = target
                    .downcast_mut::<T>()
                    .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))?;
                f(this, args)
            }),
        }
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Shortcut for an injection marker with the given required flag.
    pub fn autowired(self, required: bool) -> Self {
        self.marker(Marker::autowired(required))
    }

    /// Declares the member as type-level (static); such members are never injected.
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Injection marker, if any.
    pub fn injection_marker(&self) -> Option<&Marker> {
        self.markers.iter().find(|m| m.is(AUTOWIRED))
    }

    pub fn is_required(&self) -> bool {
        self.injection_marker().map_or(true, Marker::is_required)
    }

    /// Same name and arity: a descendant declaration overrides this one.
    pub(crate) fn is_overridden_by(&self, other: &MemberMeta) -> bool {
        self.kind == MemberKind::Method
            && other.kind == MemberKind::Method
            && self.name == other.name
            && self.params.len() == other.params.len()
    }

    pub(crate) fn apply(&self, target: &mut AnyMut, args: &mut Args) -> DiResult<()> {
        (self.apply)(target, args)
    }
}

impl std::fmt::Debug for MemberMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberMeta")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("static", &self.is_static)
            .finish()
    }
}

/// Settable property used for explicit definition values.
#[derive(Clone)]
pub struct PropertyMeta {
    name: String,
    target: TypeKey,
    set: SetFn,
}

impl PropertyMeta {
    /// Property holding a concrete value `V`.
    pub fn value<T, V, F>(name: impl Into<String>, set: F) -> Self
    where
        T: Any + Send + Sync,
        V: Any + Send + Sync,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        PropertyMeta {
            name: name.into(),
            target: TypeKey::of::<V>(),
            set: Arc::new(move |target, value| {
                let this = target
                    .downcast_mut::<T>()
                    .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))?;
                let value = value
                    .downcast::<V>()
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<V>()))?;
                set(this, value);
                Ok(())
            }),
        }
    }

    /// Property holding a trait object, usually filled from a reference.
    pub fn view<T, V, F>(name: impl Into<String>, set: F) -> Self
    where
        T: Any + Send + Sync,
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        PropertyMeta {
            name: name.into(),
            target: TypeKey::of::<V>(),
            set: Arc::new(move |target, value| {
                let this = target
                    .downcast_mut::<T>()
                    .ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))?;
                let value = crate::metadata::args::downcast_view::<V>(value)?;
                set(this, value);
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> TypeKey {
        self.target
    }

    pub(crate) fn set(&self, target: &mut AnyMut, value: AnyArc) -> DiResult<()> {
        (self.set)(target, value)
    }
}

/// Projection from a type to the embedded value of its ancestor level.
pub(crate) trait ErasedLens: Send + Sync {
    fn project<'a>(&self, target: &'a mut AnyMut) -> Option<&'a mut AnyMut>;

    fn view<'a>(&self, target: &'a AnyMut) -> Option<&'a AnyMut>;
}

pub(crate) struct TypedLens<T, P> {
    pub(crate) view: fn(&T) -> &P,
    pub(crate) lens: fn(&mut T) -> &mut P,
    pub(crate) _marker: PhantomData<fn(T) -> P>,
}

impl<T, P> ErasedLens for TypedLens<T, P>
where
    T: Any + Send + Sync,
    P: Any + Send + Sync,
{
    fn project<'a>(&self, target: &'a mut AnyMut) -> Option<&'a mut AnyMut> {
        let this = target.downcast_mut::<T>()?;
        Some((self.lens)(this) as &mut AnyMut)
    }

    fn view<'a>(&self, target: &'a AnyMut) -> Option<&'a AnyMut> {
        let this = target.downcast_ref::<T>()?;
        Some((self.view)(this) as &AnyMut)
    }
}
