//! Type keys used for every type comparison inside the container.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Type-erased shared instance, as stored in the singleton registry.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Runtime identity of a Rust type plus its name for diagnostics.
///
/// Concrete types are keyed by `T` itself; trait views are keyed by the
/// unsized `dyn Trait` type and stored as `Arc<Arc<dyn Trait>>` inside an
/// [`AnyArc`].
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{TypeKey, key_of_type};
///
/// trait Writer {}
///
/// let a = key_of_type::<String>();
/// let b = TypeKey::of::<String>();
/// assert_eq!(a, b);
/// assert_eq!(a.short_name(), "String");
/// assert_ne!(TypeKey::of::<dyn Writer>(), a);
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for any (possibly unsized) type.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name, as produced by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, without generic arguments.
    pub fn short_name(&self) -> &'static str {
        short_name(self.name)
    }
}

/// Strips module path and generic arguments from a type name.
pub(crate) fn short_name(full: &str) -> &str {
    let base = full.trim_start_matches("dyn ");
    let base = base.split(['<', ' ']).next().unwrap_or(base);
    base.rsplit("::").next().unwrap_or(base)
}

// TypeId-only comparison; the name is diagnostic.
impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> TypeKey {
    TypeKey::of::<T>()
}
