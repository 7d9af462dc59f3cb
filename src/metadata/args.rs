//! Resolved arguments handed to constructors, fields and methods.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::AnyArc;

/// One resolved injection value.
#[derive(Clone)]
pub enum Resolved {
    /// A single object (concrete `Arc<T>`, or `Arc<Arc<dyn Trait>>` for trait views).
    One(AnyArc),
    /// All matching objects with their component names, in registration order.
    Many(Vec<(String, AnyArc)>),
}

/// Positional argument list produced by the container.
///
/// Slots left empty belong to optional points that had no candidate.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Args, Resolved};
/// use std::sync::Arc;
///
/// let mut args = Args::new("demo", vec![Some(Resolved::One(Arc::new(7u32))), None]);
/// assert_eq!(*args.get::<u32>(0).unwrap(), 7);
/// assert!(args.optional::<u32>(1).unwrap().is_none());
/// assert!(args.get::<u32>(1).is_err());
/// ```
pub struct Args {
    owner: String,
    slots: Vec<Option<Resolved>>,
}

impl Args {
    pub fn new(owner: impl Into<String>, slots: Vec<Option<Resolved>>) -> Self {
        Args {
            owner: owner.into(),
            slots,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Name of the component the arguments were resolved for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn one(&self, index: usize) -> DiResult<Option<&AnyArc>> {
        match self.slots.get(index) {
            None => Err(self.missing(index, "argument index out of range")),
            Some(None) => Ok(None),
            Some(Some(Resolved::One(value))) => Ok(Some(value)),
            Some(Some(Resolved::Many(_))) => {
                Err(self.missing(index, "collection argument requested as single value"))
            }
        }
    }

    fn many(&self, index: usize) -> DiResult<&[(String, AnyArc)]> {
        match self.slots.get(index) {
            None => Err(self.missing(index, "argument index out of range")),
            Some(None) => Ok(&[]),
            Some(Some(Resolved::Many(values))) => Ok(values),
            Some(Some(Resolved::One(_))) => {
                Err(self.missing(index, "single argument requested as collection"))
            }
        }
    }

    fn missing(&self, index: usize, reason: &str) -> DiError {
        DiError::Unsatisfied {
            component: self.owner.clone(),
            member: format!("#{}", index),
            type_name: "?",
            reason: reason.to_string(),
        }
    }

    /// Required concrete argument.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> DiResult<Arc<T>> {
        self.optional::<T>(index)?
            .ok_or_else(|| self.missing(index, "no value resolved"))
    }

    /// Optional concrete argument.
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> DiResult<Option<Arc<T>>> {
        match self.one(index)? {
            None => Ok(None),
            Some(value) => value
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
        }
    }

    /// Required trait-object argument.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        self.optional_trait::<T>(index)?
            .ok_or_else(|| self.missing(index, "no value resolved"))
    }

    pub fn optional_trait<T: ?Sized + Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> DiResult<Option<Arc<T>>> {
        match self.one(index)? {
            None => Ok(None),
            Some(value) => downcast_view::<T>(value.clone()).map(Some),
        }
    }

    /// Plain value argument (converted literal), cloned out of its `Arc`.
    pub fn value<T: Any + Send + Sync + Clone>(&self, index: usize) -> DiResult<T> {
        self.get::<T>(index).map(|v| (*v).clone())
    }

    /// All concrete candidates of a collection-shaped point.
    pub fn all<T: Any + Send + Sync>(&self, index: usize) -> DiResult<Vec<Arc<T>>> {
        self.many(index)?
            .iter()
            .map(|(_, v)| {
                v.clone()
                    .downcast::<T>()
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
            })
            .collect()
    }

    pub fn all_traits<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Vec<Arc<T>>> {
        self.many(index)?
            .iter()
            .map(|(_, v)| downcast_view::<T>(v.clone()))
            .collect()
    }

    /// Map-shaped point: component name to instance.
    pub fn map<T: Any + Send + Sync>(&self, index: usize) -> DiResult<BTreeMap<String, Arc<T>>> {
        self.many(index)?
            .iter()
            .map(|(name, v)| {
                v.clone()
                    .downcast::<T>()
                    .map(|t| (name.clone(), t))
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
            })
            .collect()
    }

    pub fn map_traits<T: ?Sized + Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> DiResult<BTreeMap<String, Arc<T>>> {
        self.many(index)?
            .iter()
            .map(|(name, v)| downcast_view::<T>(v.clone()).map(|t| (name.clone(), t)))
            .collect()
    }
}

/// Trait views travel as `Arc<Arc<dyn Trait>>`.
pub(crate) fn downcast_view<T: ?Sized + Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}
