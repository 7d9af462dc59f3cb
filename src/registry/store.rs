//! Name-keyed storage of component definitions and aliases.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::definition::ComponentDefinition;
use crate::error::{DiError, DiResult};

/// Definitions by canonical name, in registration order, plus the alias table.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ComponentDefinition, DefinitionStore};
///
/// struct Pool;
///
/// let mut store = DefinitionStore::new();
/// store.register(ComponentDefinition::of::<Pool>("pool").alias("db")).unwrap();
/// store.register_alias("db", "primaryDb").unwrap();
///
/// assert_eq!(store.canonical_name("primaryDb"), "pool");
/// assert!(store.contains("db"));
///
/// store.freeze();
/// assert!(store.register(ComponentDefinition::of::<Pool>("other")).is_err());
/// ```
#[derive(Debug, Default)]
pub struct DefinitionStore {
    definitions: HashMap<String, Arc<ComponentDefinition>>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
    frozen: bool,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition and its declared aliases.
    ///
    /// A definition registered under an existing name replaces the earlier one and
    /// keeps its position in registration order.
    pub fn register(&mut self, definition: ComponentDefinition) -> DiResult<()> {
        let name = definition.name().to_string();
        if self.frozen {
            return Err(DiError::Frozen(name));
        }
        if name.is_empty() {
            return Err(DiError::config("<unnamed>", "component name must not be empty"));
        }
        if let Some(target) = self.aliases.get(&name) {
            return Err(DiError::config(
                &name,
                format!("name is already used as an alias of '{}'", target),
            ));
        }

        let aliases = definition.aliases().to_vec();
        for alias in aliases.iter().filter(|a| **a != name) {
            self.check_alias(&name, alias)?;
        }
        if self.definitions.insert(name.clone(), Arc::new(definition)).is_some() {
            debug!(component = %name, "overriding component definition");
        } else {
            self.order.push(name.clone());
        }
        for alias in aliases {
            self.register_alias(&name, &alias)?;
        }
        Ok(())
    }

    /// Registers `alias` for `name`, which may itself be an alias.
    pub fn register_alias(&mut self, name: &str, alias: &str) -> DiResult<()> {
        if self.frozen {
            return Err(DiError::Frozen(alias.to_string()));
        }
        if alias == name {
            self.aliases.remove(alias);
            return Ok(());
        }
        if self.check_alias(name, alias)? {
            self.aliases.insert(alias.to_string(), name.to_string());
        }
        Ok(())
    }

    /// Whether `alias` can point at `name`; `false` when it already does.
    fn check_alias(&self, name: &str, alias: &str) -> DiResult<bool> {
        if self.definitions.contains_key(alias) {
            return Err(DiError::config(
                alias,
                format!("cannot alias '{}': a component with this name exists", name),
            ));
        }
        if let Some(existing) = self.aliases.get(alias) {
            if existing == name {
                return Ok(false);
            }
            return Err(DiError::config(
                alias,
                format!("alias already registered for '{}'", existing),
            ));
        }
        if self.resolves_through(name, alias) {
            return Err(DiError::config(
                alias,
                format!("circular alias chain through '{}'", name),
            ));
        }
        Ok(true)
    }

    fn resolves_through(&self, start: &str, wanted: &str) -> bool {
        let mut current = start;
        while let Some(next) = self.aliases.get(current) {
            if next == wanted {
                return true;
            }
            current = next;
        }
        false
    }

    /// Follows the alias chain down to a definition name.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        while let Some(next) = self.aliases.get(current) {
            current = next;
        }
        current
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ComponentDefinition>> {
        self.definitions.get(self.canonical_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Definition names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentDefinition>> {
        self.order.iter().filter_map(|n| self.definitions.get(n))
    }

    /// Every alias that resolves to `name`, directly or through other aliases.
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let canonical = self.canonical_name(name);
        let mut found: Vec<String> = self
            .aliases
            .keys()
            .filter(|alias| alias.as_str() != name && self.canonical_name(alias) == canonical)
            .cloned()
            .collect();
        found.sort();
        found
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rejects every later registration.
    ///
    /// Each definition then carries every alias that resolves to it, including
    /// aliases registered separately and chained ones.
    pub fn freeze(&mut self) {
        for name in &self.order {
            let aliases = self.aliases_of(name);
            if let Some(definition) = self.definitions.get_mut(name) {
                if definition.aliases() != aliases.as_slice() {
                    Arc::make_mut(definition).set_aliases(aliases);
                }
            }
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repo;

    #[test]
    fn override_keeps_registration_position() {
        let mut store = DefinitionStore::new();
        store.register(ComponentDefinition::of::<Repo>("a")).unwrap();
        store.register(ComponentDefinition::of::<Repo>("b")).unwrap();
        store
            .register(ComponentDefinition::of::<Repo>("a").primary(true))
            .unwrap();
        assert_eq!(store.names(), ["a".to_string(), "b".to_string()]);
        assert!(store.get("a").unwrap().is_primary());
    }

    #[test]
    fn alias_chains_resolve_and_cycles_are_rejected() {
        let mut store = DefinitionStore::new();
        store.register(ComponentDefinition::of::<Repo>("repo")).unwrap();
        store.register_alias("repo", "r1").unwrap();
        store.register_alias("r1", "r2").unwrap();
        assert_eq!(store.canonical_name("r2"), "repo");
        assert_eq!(store.aliases_of("repo"), vec!["r1".to_string(), "r2".to_string()]);

        assert!(store.register_alias("r2", "r1").unwrap_err().is_configuration());
        assert!(store.register_alias("other", "r1").unwrap_err().is_configuration());
        assert!(store.register_alias("r2", "repo").unwrap_err().is_configuration());
    }

    #[test]
    fn alias_cannot_shadow_or_be_shadowed_by_a_name() {
        let mut store = DefinitionStore::new();
        store.register(ComponentDefinition::of::<Repo>("repo").alias("main")).unwrap();
        let err = store.register(ComponentDefinition::of::<Repo>("main")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn rejected_alias_leaves_the_store_untouched() {
        let mut store = DefinitionStore::new();
        store.register(ComponentDefinition::of::<Repo>("b")).unwrap();
        store.register(ComponentDefinition::of::<Repo>("a").primary(true)).unwrap();

        let err = store
            .register(ComponentDefinition::of::<Repo>("c").alias("b"))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(!store.contains("c"));
        assert_eq!(store.names(), ["b".to_string(), "a".to_string()]);

        store.register_alias("a", "main").unwrap();
        let err = store
            .register(ComponentDefinition::of::<Repo>("a").alias("x").alias("main2").alias("b"))
            .unwrap_err();
        assert!(err.is_configuration());
        // the earlier definition and its aliases survive
        assert!(store.get("a").unwrap().is_primary());
        assert!(!store.contains("x"));
        assert_eq!(store.aliases_of("a"), vec!["main".to_string()]);
    }

    #[test]
    fn freeze_records_registered_aliases_on_definitions() {
        let mut store = DefinitionStore::new();
        store.register(ComponentDefinition::of::<Repo>("repo").alias("r1")).unwrap();
        store.register_alias("r1", "r2").unwrap();
        store.register_alias("repo", "main").unwrap();
        store.freeze();

        let aliases = store.get("repo").unwrap().aliases().to_vec();
        assert_eq!(aliases, vec!["main".to_string(), "r1".to_string(), "r2".to_string()]);
    }

    #[test]
    fn frozen_store_rejects_registration() {
        let mut store = DefinitionStore::new();
        store.freeze();
        assert!(matches!(
            store.register(ComponentDefinition::of::<Repo>("x")),
            Err(DiError::Frozen(name)) if name == "x"
        ));
        assert!(store.is_frozen());
        assert!(store.is_empty());
    }
}
