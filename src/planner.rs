//! Injection planner: per-type plans of injectable members, built once and replayed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use crate::container::Container;
use crate::descriptor::DependencyDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::marker::VALUE;
use crate::metadata::member::AnyMut;
use crate::metadata::{project, Args, LensPath, MemberKind, MemberMeta, Resolved, TypeMetadata};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CachedArg {
    /// Re-resolve through the descriptor on every replay.
    Descriptor,
    /// Look the named component up directly.
    Shortcut(String),
}

#[derive(Debug)]
enum Resolution {
    Unresolved,
    Cached(Vec<CachedArg>),
}

/// One injectable member of a plan with its resolution cache.
pub struct PlanEntry {
    member: MemberMeta,
    declared_by: TypeKey,
    path: LensPath,
    descriptors: Vec<DependencyDescriptor>,
    cache: Mutex<Resolution>,
}

impl PlanEntry {
    fn new(member: MemberMeta, declared_by: TypeKey, path: LensPath) -> Self {
        let descriptors = DependencyDescriptor::for_member(&member);
        PlanEntry {
            member,
            declared_by,
            path,
            descriptors,
            cache: Mutex::new(Resolution::Unresolved),
        }
    }

    pub fn member(&self) -> &MemberMeta {
        &self.member
    }

    /// Type level that declared the member.
    pub fn declared_by(&self) -> TypeKey {
        self.declared_by
    }

    pub fn descriptors(&self) -> &[DependencyDescriptor] {
        &self.descriptors
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.cache.lock(), Resolution::Cached(_))
    }

    /// Component names cached as direct shortcuts, per parameter.
    pub fn shortcuts(&self) -> Vec<Option<String>> {
        match &*self.cache.lock() {
            Resolution::Unresolved => vec![None; self.descriptors.len()],
            Resolution::Cached(args) => args
                .iter()
                .map(|a| match a {
                    CachedArg::Shortcut(name) => Some(name.clone()),
                    CachedArg::Descriptor => None,
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for PlanEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanEntry")
            .field("member", &self.member.name())
            .field("declared_by", &self.declared_by)
            .field("cache", &*self.cache.lock())
            .finish()
    }
}

/// Ordered injectable members of one type; ancestor members come first.
#[derive(Debug)]
pub struct InjectionPlan {
    target: TypeKey,
    entries: Vec<PlanEntry>,
}

impl InjectionPlan {
    pub fn target(&self) -> TypeKey {
        self.target
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.member.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds and caches injection plans, and replays them on new instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{InjectionPlanner, Param, TypeMetadata};
/// use std::sync::Arc;
///
/// struct Service { retries: Option<Arc<u32>> }
///
/// let meta = TypeMetadata::builder::<Service>()
///     .autowired_field("retries", Param::of::<u32>().optional(), |s: &mut Service, args| {
///         s.retries = args.optional::<u32>(0)?;
///         Ok(())
///     })
///     .build();
///
/// let planner = InjectionPlanner::new();
/// let plan = planner.plan_for(&meta);
/// assert!(Arc::ptr_eq(&plan, &planner.plan_for(&meta)));
/// assert_eq!(plan.member_names(), vec!["retries"]);
/// ```
#[derive(Default)]
pub struct InjectionPlanner {
    plans: RwLock<HashMap<TypeKey, Arc<InjectionPlan>>>,
}

impl InjectionPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached plan for the type described by `metadata`.
    pub fn plan_for(&self, metadata: &TypeMetadata) -> Arc<InjectionPlan> {
        if let Some(plan) = self.plans.read().get(&metadata.key()) {
            return plan.clone();
        }
        let mut plans = self.plans.write();
        plans
            .entry(metadata.key())
            .or_insert_with(|| Arc::new(Self::build(metadata)))
            .clone()
    }

    pub fn cached_plans(&self) -> usize {
        self.plans.read().len()
    }

    fn build(metadata: &TypeMetadata) -> InjectionPlan {
        let mut entries: Vec<PlanEntry> = Vec::new();
        let mut descendant_methods: Vec<&MemberMeta> = Vec::new();

        for (path, level) in metadata.levels() {
            let mut current = Vec::new();
            for member in level.members() {
                if !is_injectable(member) {
                    continue;
                }
                if member.is_static() {
                    warn!(
                        target_type = %level.key(),
                        member = %member.name(),
                        "injection markers are not supported on static members; skipping"
                    );
                    continue;
                }
                if descendant_methods.iter().any(|d| member.is_overridden_by(d)) {
                    trace!(member = %member.name(), "skipping overridden ancestor method");
                    continue;
                }
                current.push(PlanEntry::new(member.clone(), level.key(), path.clone()));
            }
            descendant_methods.extend(
                level
                    .members()
                    .iter()
                    .filter(|m| m.kind() == MemberKind::Method),
            );
            current.append(&mut entries);
            entries = current;
        }

        trace!(target_type = %metadata.key(), members = entries.len(), "built injection plan");
        InjectionPlan {
            target: metadata.key(),
            entries,
        }
    }

    /// Applies every entry of `plan` to `target`, resolving dependencies for `owner`.
    pub(crate) fn inject(
        &self,
        container: &Container,
        plan: &InjectionPlan,
        target: &mut AnyMut,
        owner: &str,
    ) -> DiResult<()> {
        for entry in &plan.entries {
            let slots = match Self::resolve_entry(container, entry, owner)? {
                Some(slots) => slots,
                None => {
                    trace!(component = %owner, member = %entry.member.name(), "optional member left unset");
                    continue;
                }
            };
            let level = project(target, &entry.path)
                .ok_or(DiError::TypeMismatch(entry.declared_by.name()))?;
            let mut args = Args::new(owner, slots);
            entry
                .member
                .apply(level, &mut args)
                .map_err(|e| DiError::member(owner, entry.member.name(), e))?;
            trace!(component = %owner, member = %entry.member.name(), "injected");
        }
        Ok(())
    }

    /// Resolved slots, or `None` when an optional member must be skipped.
    fn resolve_entry(
        container: &Container,
        entry: &PlanEntry,
        owner: &str,
    ) -> DiResult<Option<Vec<Option<Resolved>>>> {
        let cached = match &*entry.cache.lock() {
            Resolution::Cached(args) => Some(args.clone()),
            Resolution::Unresolved => None,
        };

        let mut touched = Vec::new();
        let mut slots = Vec::with_capacity(entry.descriptors.len());
        let mut fresh = Vec::with_capacity(entry.descriptors.len());

        for (i, descriptor) in entry.descriptors.iter().enumerate() {
            let slot = match cached.as_ref().map(|args| &args[i]) {
                Some(CachedArg::Shortcut(name)) => {
                    touched.push(name.clone());
                    let value = container
                        .get_as(name, descriptor.element())
                        .map_err(|e| wrap(owner, entry, e))?;
                    Some(Resolved::One(value))
                }
                _ => {
                    let point = container
                        .resolve_point(descriptor, owner)
                        .map_err(|e| wrap(owner, entry, e))?;
                    touched.extend(point.names);
                    fresh.push(match point.shortcut {
                        Some(name) => CachedArg::Shortcut(name),
                        None => CachedArg::Descriptor,
                    });
                    point.value
                }
            };
            slots.push(slot);
        }

        let complete = slots.iter().all(Option::is_some);
        if cached.is_none() && complete {
            let mut cache = entry.cache.lock();
            if matches!(*cache, Resolution::Unresolved) {
                *cache = Resolution::Cached(fresh);
            }
        }
        container.register_dependents(&touched, owner);

        let skip = match entry.member.kind() {
            MemberKind::Field => !complete,
            MemberKind::Method => !complete && !entry.member.is_required(),
        };
        Ok(if skip { None } else { Some(slots) })
    }
}

fn is_injectable(member: &MemberMeta) -> bool {
    member.injection_marker().is_some() || member.markers().iter().any(|m| m.is(VALUE))
}

fn wrap(owner: &str, entry: &PlanEntry, error: DiError) -> DiError {
    match error {
        DiError::Unsatisfied { .. } => error,
        other => DiError::member(owner, entry.member.name(), other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use crate::metadata::Param;

    #[derive(Default)]
    struct Base {
        clock: Option<Arc<u64>>,
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        name: Option<Arc<String>>,
    }

    fn base_meta() -> TypeMetadata {
        TypeMetadata::builder::<Base>()
            .autowired_field("clock", Param::of::<u64>(), |b: &mut Base, args| {
                b.clock = Some(args.get::<u64>(0)?);
                Ok(())
            })
            .autowired_method("configure", vec![Param::of::<u64>()], |_, _| Ok(()))
            .autowired_method("reset", vec![], |_, _| Ok(()))
            .build()
    }

    fn derived_meta() -> TypeMetadata {
        TypeMetadata::builder::<Derived>()
            .parent(base_meta(), |d: &Derived| &d.base, |d: &mut Derived| &mut d.base)
            .autowired_field("name", Param::of::<String>(), |d: &mut Derived, args| {
                d.name = Some(args.get::<String>(0)?);
                Ok(())
            })
            .member(MemberMeta::method::<Derived, _>("configure", vec![Param::of::<u64>()], |_, _| Ok(())))
            .member(
                MemberMeta::field::<Derived, _>("counter", Param::of::<u32>(), |_, _| Ok(()))
                    .autowired(true)
                    .static_member(),
            )
            .build()
    }

    #[test]
    fn ancestor_members_precede_descendant_members() {
        let planner = InjectionPlanner::new();
        let plan = planner.plan_for(&derived_meta());
        assert_eq!(plan.member_names(), vec!["clock", "reset", "name"]);
        assert_eq!(plan.entries()[0].declared_by(), TypeKey::of::<Base>());
        assert_eq!(plan.target(), TypeKey::of::<Derived>());
    }

    #[test]
    fn plans_are_cached_per_type() {
        let planner = InjectionPlanner::new();
        let meta = derived_meta();
        let first = planner.plan_for(&meta);
        let second = planner.plan_for(&meta);
        assert!(Arc::ptr_eq(&first, &second));
        planner.plan_for(&base_meta());
        assert_eq!(planner.cached_plans(), 2);
    }

    #[test]
    fn value_marked_members_are_injectable() {
        let meta = TypeMetadata::builder::<Base>()
            .member(
                MemberMeta::field::<Base, _>("timeout", Param::of::<u64>(), |_, _| Ok(()))
                    .marker(Marker::value("30")),
            )
            .member(MemberMeta::field::<Base, _>("plain", Param::of::<u64>(), |_, _| Ok(())))
            .build();
        let plan = InjectionPlanner::new().plan_for(&meta);
        assert_eq!(plan.member_names(), vec!["timeout"]);
        assert!(!plan.entries()[0].is_resolved());
        assert_eq!(plan.entries()[0].shortcuts(), vec![None]);
    }
}
