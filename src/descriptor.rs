//! Dependency descriptors: one injection point each.

use std::fmt;

use once_cell::sync::OnceCell;

use crate::key::TypeKey;
use crate::marker::Marker;
use crate::metadata::{MemberKind, MemberMeta, Param, Shape};

/// Description of one point where a component must be supplied.
///
/// Immutable after construction except for the lazily built display name.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{DependencyDescriptor, Marker, Shape};
///
/// trait Writer {}
///
/// let d = DependencyDescriptor::of::<dyn Writer>()
///     .with_name("writer")
///     .with_marker(Marker::qualifier("fast"));
/// assert!(d.is_required());
/// assert_eq!(d.shape(), Shape::Single);
/// assert_eq!(d.dependency_name(), Some("writer"));
/// ```
#[derive(Clone)]
pub struct DependencyDescriptor {
    element: TypeKey,
    shape: Shape,
    required: bool,
    eager: bool,
    markers: Vec<Marker>,
    callable_markers: Vec<Marker>,
    dependency_name: Option<String>,
    member: Option<String>,
    param_index: Option<usize>,
    display: OnceCell<String>,
}

impl DependencyDescriptor {
    pub fn new(element: TypeKey) -> Self {
        DependencyDescriptor {
            element,
            shape: Shape::Single,
            required: true,
            eager: true,
            markers: Vec::new(),
            callable_markers: Vec::new(),
            dependency_name: None,
            member: None,
            param_index: None,
            display: OnceCell::new(),
        }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>())
    }

    /// Descriptor for parameter `index` of a constructor or method.
    pub(crate) fn for_param(
        param: &Param,
        index: usize,
        callable: Option<&str>,
        callable_markers: &[Marker],
        required: bool,
    ) -> Self {
        DependencyDescriptor {
            shape: param.shape(),
            required: required && param.is_required(),
            markers: param.markers().to_vec(),
            callable_markers: callable_markers.to_vec(),
            dependency_name: param.name().map(str::to_string),
            member: callable.map(str::to_string),
            param_index: Some(index),
            ..Self::new(param.element())
        }
    }

    /// Descriptors for every parameter of an injectable member.
    pub(crate) fn for_member(member: &MemberMeta) -> Vec<Self> {
        let required = member.is_required();
        match member.kind() {
            MemberKind::Field => member
                .params()
                .iter()
                .map(|param| {
                    let mut markers = member.markers().to_vec();
                    markers.extend(param.markers().iter().cloned());
                    DependencyDescriptor {
                        shape: param.shape(),
                        required: required && param.is_required(),
                        markers,
                        dependency_name: Some(member.name().to_string()),
                        member: Some(member.name().to_string()),
                        ..Self::new(param.element())
                    }
                })
                .collect(),
            MemberKind::Method => member
                .params()
                .iter()
                .enumerate()
                .map(|(i, param)| {
                    Self::for_param(param, i, Some(member.name()), member.markers(), required)
                })
                .collect(),
        }
    }

    pub fn shaped(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Restricts type checks to candidates that need no instantiation to confirm their type.
    pub fn lazy_type_check(mut self) -> Self {
        self.eager = false;
        self
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn with_callable_marker(mut self, marker: Marker) -> Self {
        self.callable_markers.push(marker);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.member = Some(name.clone());
        self.dependency_name = Some(name);
        self
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

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Markers of the enclosing method or constructor, for parameter points.
    pub fn callable_markers(&self) -> &[Marker] {
        &self.callable_markers
    }

    /// Field or parameter name, used as the last tie-break.
    pub fn dependency_name(&self) -> Option<&str> {
        self.dependency_name.as_deref()
    }

    pub fn param_index(&self) -> Option<usize> {
        self.param_index
    }

    /// Member name used in diagnostics.
    pub fn display_name(&self) -> &str {
        self.display.get_or_init(|| {
            match (&self.member, self.param_index, &self.dependency_name) {
                (Some(member), Some(i), Some(param)) => format!("{}[{}:{}]", member, i, param),
                (Some(member), Some(i), None) => format!("{}[{}]", member, i),
                (Some(member), None, _) => member.clone(),
                (None, Some(i), Some(param)) => format!("<init>[{}:{}]", i, param),
                (None, Some(i), None) => format!("<init>[{}]", i),
                (None, None, _) => self.element.short_name().to_string(),
            }
        })
    }
}

impl fmt::Debug for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDescriptor")
            .field("point", &self.display_name())
            .field("type", &self.element)
            .field("shape", &self.shape)
            .field("required", &self.required)
            .field("eager", &self.eager)
            .field("markers", &self.markers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Logger;

    #[test]
    fn field_descriptor_merges_member_and_param_markers() {
        let member = MemberMeta::field::<Logger, _>(
            "writer",
            Param::of::<u32>().marker(Marker::qualifier("a")),
            |_, _| Ok(()),
        )
        .autowired(false);
        let descriptors = DependencyDescriptor::for_member(&member);
        assert_eq!(descriptors.len(), 1);
        let d = &descriptors[0];
        assert!(!d.is_required());
        assert_eq!(d.markers().len(), 2);
        assert_eq!(d.display_name(), "writer");
    }

    #[test]
    fn method_descriptors_carry_callable_markers_and_indices() {
        let member = MemberMeta::method::<Logger, _>(
            "configure",
            vec![Param::of::<u32>().named("level"), Param::of::<String>()],
            |_, _| Ok(()),
        )
        .autowired(true)
        .marker(Marker::value("3"));
        let descriptors = DependencyDescriptor::for_member(&member);
        assert_eq!(descriptors[0].display_name(), "configure[0:level]");
        assert_eq!(descriptors[1].display_name(), "configure[1]");
        assert_eq!(descriptors[1].callable_markers().len(), 2);
    }
}
