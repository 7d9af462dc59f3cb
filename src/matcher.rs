//! Candidate matching: eligibility by qualifier markers and tie-breaking.

use tracing::trace;

use crate::definition::ComponentDefinition;
use crate::descriptor::DependencyDescriptor;
use crate::error::{DiError, DiResult};
use crate::marker::{Marker, QUALIFIER, VALUE, VALUE_ATTRIBUTE};

/// Decides whether a definition may satisfy a dependency descriptor.
///
/// Qualifier markers on the descriptor are checked against, in order, the
/// qualifiers registered on the definition, the markers of its producer or its
/// type, the definition's own attributes, and (for the `value` attribute only)
/// the definition's name and aliases.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{CandidateMatcher, ComponentDefinition, DependencyDescriptor, Marker, QualifierSpec};
///
/// struct Db;
///
/// let matcher = CandidateMatcher::new();
/// let main = ComponentDefinition::of::<Db>("db1").qualifier(QualifierSpec::named("main"));
/// let wants_main = DependencyDescriptor::of::<Db>().with_marker(Marker::qualifier("main"));
/// let wants_backup = DependencyDescriptor::of::<Db>().with_marker(Marker::qualifier("backup"));
///
/// assert!(matcher.is_candidate(&main, &[], &wants_main));
/// assert!(!matcher.is_candidate(&main, &[], &wants_backup));
/// ```
#[derive(Debug, Clone)]
pub struct CandidateMatcher {
    qualifier_types: Vec<String>,
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateMatcher {
    pub fn new() -> Self {
        CandidateMatcher {
            qualifier_types: vec![QUALIFIER.to_string()],
        }
    }

    /// Treats markers of `type_name` as qualifiers even without a qualifier meta marker.
    pub fn with_qualifier_type(mut self, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        if !self.qualifier_types.contains(&type_name) {
            self.qualifier_types.push(type_name);
        }
        self
    }

    /// A marker is a qualifier if its type is registered as one or carries a qualifier meta marker.
    pub fn is_qualifier(&self, marker: &Marker) -> bool {
        self.is_qualifier_type(marker.type_name())
            || marker
                .meta_markers()
                .iter()
                .any(|m| self.is_qualifier_type(m.type_name()))
    }

    fn is_qualifier_type(&self, type_name: &str) -> bool {
        self.qualifier_types.iter().any(|q| q == type_name)
    }

    /// `type_markers` are the markers declared on the definition's target type.
    pub fn is_candidate(
        &self,
        definition: &ComponentDefinition,
        type_markers: &[Marker],
        descriptor: &DependencyDescriptor,
    ) -> bool {
        if !definition.is_autowire_candidate() {
            return false;
        }
        let matched = self.check_qualifiers(definition, type_markers, descriptor.markers())
            && (descriptor.param_index().is_none()
                || self.check_qualifiers(definition, type_markers, descriptor.callable_markers()));
        trace!(
            component = %definition.name(),
            point = %descriptor.display_name(),
            matched,
            "qualifier check"
        );
        matched
    }

    fn check_qualifiers(
        &self,
        definition: &ComponentDefinition,
        type_markers: &[Marker],
        markers: &[Marker],
    ) -> bool {
        for marker in markers {
            let mut check_meta = true;
            let mut fallback_to_meta = false;
            if self.is_qualifier(marker) {
                if self.check_qualifier(definition, type_markers, marker) {
                    check_meta = false;
                } else {
                    fallback_to_meta = true;
                }
            }
            if check_meta {
                let mut found_meta = false;
                for meta in marker.meta_markers() {
                    if !self.is_qualifier(meta) {
                        continue;
                    }
                    found_meta = true;
                    let meta_is_bare = meta.attribute(VALUE_ATTRIBUTE).map_or(true, str::is_empty);
                    if (fallback_to_meta && meta_is_bare)
                        || !self.check_qualifier(definition, type_markers, meta)
                    {
                        return false;
                    }
                }
                if fallback_to_meta && !found_meta {
                    return false;
                }
            }
        }
        true
    }

    fn check_qualifier(
        &self,
        definition: &ComponentDefinition,
        type_markers: &[Marker],
        marker: &Marker,
    ) -> bool {
        let qualifier = definition
            .find_qualifier(marker.type_name())
            .or_else(|| definition.find_qualifier(marker.short_name()));

        if qualifier.is_none() {
            let producer_markers = definition.producer().map(|p| p.markers()).unwrap_or(&[]);
            let declared = producer_markers
                .iter()
                .find(|m| m.is(marker.type_name()))
                .or_else(|| type_markers.iter().find(|m| m.is(marker.type_name())));
            if declared == Some(marker) {
                return true;
            }
        }

        let attributes = marker.effective_attributes();
        if attributes.is_empty() && qualifier.is_none() {
            // Nothing to distinguish candidates by.
            return false;
        }

        for (name, expected) in attributes {
            let mut actual = qualifier.and_then(|q| q.attribute(name));
            if actual.is_none() {
                actual = definition.get_attribute(name);
            }
            if actual.is_none() && name == VALUE_ATTRIBUTE && matches_name(definition, expected) {
                continue;
            }
            if actual.is_none() && qualifier.is_some() {
                actual = marker.default_value(name);
            }
            if actual != Some(expected) {
                return false;
            }
        }
        true
    }

    /// Literal of a value marker on the point, else on the enclosing callable.
    pub fn find_suggested_value(&self, descriptor: &DependencyDescriptor) -> DiResult<Option<String>> {
        let own = Self::find_value(descriptor, descriptor.markers())?;
        if own.is_some() {
            return Ok(own);
        }
        Self::find_value(descriptor, descriptor.callable_markers())
    }

    fn find_value(descriptor: &DependencyDescriptor, markers: &[Marker]) -> DiResult<Option<String>> {
        match markers.iter().find(|m| m.is(VALUE)) {
            None => Ok(None),
            Some(marker) => marker
                .attribute(VALUE_ATTRIBUTE)
                .map(|v| Some(v.to_string()))
                .ok_or_else(|| {
                    DiError::config(descriptor.display_name(), "value marker must carry a value")
                }),
        }
    }

    /// Picks one of several eligible candidates, in registration order.
    ///
    /// A single candidate wins; otherwise the primary one; otherwise the one whose
    /// name or alias equals the point's dependency name.
    pub fn determine_candidate<'a>(
        &self,
        candidates: &[&'a ComponentDefinition],
        descriptor: &DependencyDescriptor,
    ) -> DiResult<Option<&'a ComponentDefinition>> {
        match candidates {
            [] => return Ok(None),
            [only] => return Ok(Some(*only)),
            _ => {}
        }

        let primaries: Vec<&'a ComponentDefinition> =
            candidates.iter().copied().filter(|d| d.is_primary()).collect();
        match primaries.as_slice() {
            [primary] => return Ok(Some(*primary)),
            [] => {}
            _ => {
                return Err(DiError::NoUniqueComponent {
                    type_name: descriptor.element().name(),
                    candidates: primaries.iter().map(|d| d.name().to_string()).collect(),
                })
            }
        }

        if let Some(wanted) = descriptor.dependency_name() {
            if let Some(found) = candidates.iter().find(|d| matches_name(d, wanted)) {
                return Ok(Some(*found));
            }
        }

        Err(DiError::NoUniqueComponent {
            type_name: descriptor.element().name(),
            candidates: candidates.iter().map(|d| d.name().to_string()).collect(),
        })
    }
}

fn matches_name(definition: &ComponentDefinition, candidate: &str) -> bool {
    definition.name() == candidate || definition.aliases().iter().any(|a| a == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::QualifierSpec;

    struct Db;

    fn genre(value: &str) -> Marker {
        Marker::new("app::Genre")
            .default_attr(VALUE_ATTRIBUTE, "")
            .attr(VALUE_ATTRIBUTE, value)
            .meta(Marker::bare_qualifier())
    }

    #[test]
    fn non_candidates_are_rejected_before_qualifiers() {
        let matcher = CandidateMatcher::new();
        let def = ComponentDefinition::of::<Db>("db").autowire_candidate(false);
        assert!(!matcher.is_candidate(&def, &[], &DependencyDescriptor::of::<Db>()));
    }

    #[test]
    fn unmarked_descriptor_accepts_any_candidate() {
        let matcher = CandidateMatcher::new();
        let def = ComponentDefinition::of::<Db>("db");
        assert!(matcher.is_candidate(&def, &[], &DependencyDescriptor::of::<Db>()));
    }

    #[test]
    fn value_attribute_falls_back_to_name_and_aliases() {
        let matcher = CandidateMatcher::new();
        let def = ComponentDefinition::of::<Db>("primaryDb").alias("main");
        let by_name = DependencyDescriptor::of::<Db>().with_marker(Marker::qualifier("primaryDb"));
        let by_alias = DependencyDescriptor::of::<Db>().with_marker(Marker::qualifier("main"));
        let other = DependencyDescriptor::of::<Db>().with_marker(Marker::qualifier("other"));
        assert!(matcher.is_candidate(&def, &[], &by_name));
        assert!(matcher.is_candidate(&def, &[], &by_alias));
        assert!(!matcher.is_candidate(&def, &[], &other));
    }

    #[test]
    fn name_fallback_is_limited_to_the_value_attribute() {
        let matcher = CandidateMatcher::new().with_qualifier_type("app::Tier");
        let def = ComponentDefinition::of::<Db>("gold");
        let marker = Marker::new("app::Tier").attr("level", "gold");
        let d = DependencyDescriptor::of::<Db>().with_marker(marker);
        assert!(!matcher.is_candidate(&def, &[], &d));

        let with_attr = ComponentDefinition::of::<Db>("x").attribute("level", "gold");
        assert!(matcher.is_candidate(&with_attr, &[], &d));
    }

    #[test]
    fn bare_marker_without_registered_qualifier_fails_closed() {
        let matcher = CandidateMatcher::new();
        let def = ComponentDefinition::of::<Db>("db");
        let d = DependencyDescriptor::of::<Db>().with_marker(Marker::bare_qualifier());
        assert!(!matcher.is_candidate(&def, &[], &d));

        let registered = def.qualifier(QualifierSpec::new(QUALIFIER));
        assert!(matcher.is_candidate(&registered, &[], &d));
    }

    #[test]
    fn marker_default_applies_only_with_registered_qualifier() {
        let matcher = CandidateMatcher::new();
        let d = DependencyDescriptor::of::<Db>()
            .with_marker(Marker::new("app::Genre").default_attr("format", "cd").meta(Marker::bare_qualifier()));
        let plain = ComponentDefinition::of::<Db>("db");
        assert!(!matcher.is_candidate(&plain, &[], &d));

        let qualified = ComponentDefinition::of::<Db>("db").qualifier(QualifierSpec::new("Genre"));
        assert!(matcher.is_candidate(&qualified, &[], &d));
    }

    #[test]
    fn type_level_marker_satisfies_custom_qualifier() {
        let matcher = CandidateMatcher::new();
        let def = ComponentDefinition::of::<Db>("jazzDb");
        let d = DependencyDescriptor::of::<Db>().with_marker(genre("jazz"));
        assert!(matcher.is_candidate(&def, &[genre("jazz")], &d));
        assert!(!matcher.is_candidate(&def, &[genre("rock")], &d));
    }

    #[test]
    fn callable_markers_apply_to_parameters_only() {
        let matcher = CandidateMatcher::new();
        let def = ComponentDefinition::of::<Db>("db");
        let param = crate::metadata::Param::of::<Db>();
        let d = DependencyDescriptor::for_param(&param, 0, Some("setDb"), &[Marker::qualifier("other")], true);
        assert!(!matcher.is_candidate(&def, &[], &d));
    }

    #[test]
    fn suggested_value_prefers_point_over_callable() {
        let matcher = CandidateMatcher::new();
        let d = DependencyDescriptor::of::<u32>()
            .with_marker(Marker::value("7"))
            .with_callable_marker(Marker::value("9"));
        assert_eq!(matcher.find_suggested_value(&d).unwrap().as_deref(), Some("7"));

        let only_callable = DependencyDescriptor::of::<u32>().with_callable_marker(Marker::value("9"));
        assert_eq!(matcher.find_suggested_value(&only_callable).unwrap().as_deref(), Some("9"));

        let empty = DependencyDescriptor::of::<u32>().with_marker(Marker::new(VALUE));
        assert!(matcher.find_suggested_value(&empty).unwrap_err().is_configuration());
    }

    #[test]
    fn tie_break_prefers_primary_then_name() {
        let matcher = CandidateMatcher::new();
        let a = ComponentDefinition::of::<Db>("a");
        let b = ComponentDefinition::of::<Db>("b").primary(true);
        let d = DependencyDescriptor::of::<Db>();
        let picked = matcher.determine_candidate(&[&a, &b], &d).unwrap().unwrap();
        assert_eq!(picked.name(), "b");

        let c = ComponentDefinition::of::<Db>("c");
        let named = DependencyDescriptor::of::<Db>().with_name("c");
        let picked = matcher.determine_candidate(&[&a, &c], &named).unwrap().unwrap();
        assert_eq!(picked.name(), "c");

        assert!(matches!(
            matcher.determine_candidate(&[&a, &c], &d),
            Err(DiError::NoUniqueComponent { .. })
        ));

        let b2 = ComponentDefinition::of::<Db>("b2").primary(true);
        assert!(matcher.determine_candidate(&[&b, &b2], &d).is_err());
    }
}
