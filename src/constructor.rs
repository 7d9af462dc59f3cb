//! Constructor selection and argument resolution.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::container::Container;
use crate::definition::ComponentDefinition;
use crate::descriptor::DependencyDescriptor;
use crate::error::{DiError, DiResult};
use crate::metadata::member::AnyMut;
use crate::metadata::{Args, ConstructorMeta, Resolved, Shape, TypeMetadata};
use crate::value::holder_id;

/// Chooses the constructors eligible for autowiring.
pub struct ConstructorSelector;

impl ConstructorSelector {
    /// Candidate constructors, or `None` when only the default constructor applies.
    ///
    /// A required-marked constructor is the sole candidate. Otherwise every marked
    /// constructor is a candidate and the zero-argument constructor is appended as
    /// a fallback. Without markers, a type with a single constructor taking
    /// parameters uses that constructor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_wire::{ConstructorSelector, Param, TypeMetadata};
    ///
    /// struct Repo;
    ///
    /// let meta = TypeMetadata::builder::<Repo>()
    ///     .constructor(vec![], |_| Ok(Repo))
    ///     .autowired_constructor(true, vec![Param::of::<u32>()], |_| Ok(Repo))
    ///     .autowired_constructor(false, vec![Param::of::<u32>(), Param::of::<u8>()], |_| Ok(Repo))
    ///     .build();
    ///
    /// let selected = ConstructorSelector::select(&meta).unwrap().unwrap();
    /// assert_eq!(selected.len(), 1);
    /// assert_eq!(selected[0].arity(), 1);
    /// ```
    pub fn select(metadata: &TypeMetadata) -> DiResult<Option<Vec<&ConstructorMeta>>> {
        let owner = metadata.key().name();
        let mut required: Option<&ConstructorMeta> = None;
        let mut candidates: Vec<&ConstructorMeta> = Vec::new();
        let mut default: Option<&ConstructorMeta> = None;

        for ctor in metadata.constructors() {
            match ctor.marker() {
                Some(marker) => {
                    if ctor.arity() == 0 {
                        return Err(DiError::config(
                            owner,
                            "a marked constructor must declare at least one parameter",
                        ));
                    }
                    if marker.is_required() {
                        if required.is_some() {
                            return Err(DiError::config(
                                owner,
                                "found a second constructor marked as required",
                            ));
                        }
                        required = Some(ctor);
                    }
                    candidates.push(ctor);
                }
                None if ctor.arity() == 0 => default = Some(ctor),
                None => {}
            }
        }

        if let Some(required) = required {
            return Ok(Some(vec![required]));
        }
        if !candidates.is_empty() {
            candidates.extend(default);
            return Ok(Some(candidates));
        }
        match metadata.constructors() {
            [only] if only.arity() > 0 => Ok(Some(vec![only])),
            _ => Ok(None),
        }
    }

    pub(crate) fn default_constructor(metadata: &TypeMetadata) -> Option<&ConstructorMeta> {
        metadata.constructors().iter().find(|c| c.arity() == 0)
    }
}

/// Picks a constructor for `definition` and invokes it with resolved arguments.
///
/// Candidates are tried by descending arity; the first whose parameters can all
/// be filled wins. Explicit constructor-argument values of the definition are
/// applied first, autowiring only fills the remaining parameters.
pub(crate) fn instantiate(
    container: &Container,
    name: &str,
    definition: &ComponentDefinition,
    metadata: &TypeMetadata,
) -> DiResult<(Box<AnyMut>, Vec<String>)> {
    let explicit = definition.constructor_args();
    let mut candidates = match ConstructorSelector::select(metadata)? {
        Some(candidates) => candidates,
        None if !explicit.is_empty() => metadata.constructors().iter().collect(),
        None => match ConstructorSelector::default_constructor(metadata) {
            Some(ctor) => vec![ctor],
            None => {
                return Err(DiError::config(
                    name,
                    format!("no usable constructor on '{}'", metadata.key().name()),
                ))
            }
        },
    };
    candidates.sort_by(|a, b| b.arity().cmp(&a.arity()));

    let min_arity = explicit.min_arity();
    let mut last_error: Option<DiError> = None;
    for ctor in candidates {
        if ctor.arity() < min_arity {
            continue;
        }
        match resolve_arguments(container, name, definition, ctor) {
            Ok((slots, touched)) => {
                debug!(component = %name, arity = ctor.arity(), "invoking constructor");
                let mut args = Args::new(name, slots);
                let object = ctor.invoke(&mut args)?;
                return Ok((object, touched));
            }
            Err(e) if is_unsatisfied(&e) => {
                trace!(component = %name, arity = ctor.arity(), error = %e, "constructor not satisfiable");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        DiError::config(
            name,
            format!(
                "no constructor accepts the {} declared constructor arguments",
                explicit.len()
            ),
        )
    }))
}

fn is_unsatisfied(error: &DiError) -> bool {
    matches!(
        error,
        DiError::Unsatisfied { .. } | DiError::NoUniqueComponent { .. } | DiError::NoSuchType(_)
    )
}

type ResolvedArgs = (Vec<Option<Resolved>>, Vec<String>);

fn resolve_arguments(
    container: &Container,
    name: &str,
    definition: &ComponentDefinition,
    ctor: &ConstructorMeta,
) -> DiResult<ResolvedArgs> {
    let explicit = definition.constructor_args();
    let callable_markers: Vec<_> = ctor.marker().into_iter().cloned().collect();
    let mut used = HashSet::new();
    let mut slots = Vec::with_capacity(ctor.arity());
    let mut touched = Vec::new();

    for (index, param) in ctor.params().iter().enumerate() {
        if param.shape() == Shape::Single {
            let holder = explicit
                .argument_value(index, param.element(), param.name(), &used)
                .or_else(|| {
                    if ctor.arity() == explicit.len() {
                        explicit.any_unused(&used)
                    } else {
                        None
                    }
                });
            if let Some(holder) = holder {
                used.insert(holder_id(&holder));
                let value = container
                    .value_resolver()
                    .resolve(container, name, &holder, param.element())
                    .map_err(|e| DiError::member(name, format!("<init>[{}]", index), e))?;
                slots.push(Some(Resolved::One(value)));
                continue;
            }
        }

        let descriptor = DependencyDescriptor::for_param(param, index, None, &callable_markers, true);
        let point = container.resolve_point(&descriptor, name)?;
        touched.extend(point.names);
        slots.push(point.value);
    }
    Ok((slots, touched))
}
