//! Container configuration.
//!
//! Settings come from layered sources (environment variables by default, JSON
//! with the `config` feature) and are read into a [`ContainerConfig`].

use std::collections::HashMap;
use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

const ENV_PREFIX: &str = "FERROUS_WIRE";

/// A raw configuration value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl ConfigValue {
    fn parse(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            ConfigValue::Boolean(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            ConfigValue::Integer(i)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            _ => Err(DiError::TypeMismatch("Config value is not a boolean")),
        }
    }

    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            _ => Err(DiError::TypeMismatch("Config value is not an integer")),
        }
    }
}

/// Source of configuration values, keyed by dotted lowercase names.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;
}

/// Reads `PREFIX_SOME_KEY` for key `some.key`.
#[derive(Debug)]
pub struct EnvironmentConfigSource {
    prefix: String,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for EnvironmentConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        let env_key = format!(
            "{}_{}",
            self.prefix.to_uppercase(),
            key.replace('.', "_").to_uppercase()
        );
        env::var(env_key).ok().map(|raw| ConfigValue::parse(&raw))
    }
}

/// Flat key/value source, filled from JSON with the `config` feature.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }
}

/// Sources in priority order; the first one holding a key wins.
#[derive(Debug, Default)]
pub struct ConfigProvider {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|s| s.get(key))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool().ok()).unwrap_or(default)
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_i64().ok()).unwrap_or(default)
    }
}

/// Behavior switches of a container.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::ContainerConfig;
///
/// let config = ContainerConfig::default()
///     .allow_circular_references(false)
///     .max_creation_depth(64);
/// assert!(!config.allow_circular_references);
/// assert!(config.allow_eager_type_check);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerConfig {
    /// Expose early references for producer-backed singletons on a cycle.
    pub allow_circular_references: bool,
    /// Allow candidate lookups to instantiate components to confirm their type.
    pub allow_eager_type_check: bool,
    /// Nesting limit of one creation path.
    pub max_creation_depth: usize,
    /// Instantiate non-lazy singletons during `build()`.
    pub pre_instantiate_on_build: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            allow_circular_references: true,
            allow_eager_type_check: true,
            max_creation_depth: 256,
            pre_instantiate_on_build: false,
        }
    }
}

impl ContainerConfig {
    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn allow_eager_type_check(mut self, allow: bool) -> Self {
        self.allow_eager_type_check = allow;
        self
    }

    pub fn max_creation_depth(mut self, depth: usize) -> Self {
        self.max_creation_depth = depth;
        self
    }

    pub fn pre_instantiate_on_build(mut self, eager: bool) -> Self {
        self.pre_instantiate_on_build = eager;
        self
    }

    /// Reads settings from a provider, falling back to defaults.
    pub fn load(config: &ConfigProvider) -> Self {
        let defaults = Self::default();
        ContainerConfig {
            allow_circular_references: config
                .get_bool_or("circular.allow", defaults.allow_circular_references),
            allow_eager_type_check: config
                .get_bool_or("type_check.eager", defaults.allow_eager_type_check),
            max_creation_depth: config
                .get_i64_or("creation.max_depth", defaults.max_creation_depth as i64)
                .max(1) as usize,
            pre_instantiate_on_build: config
                .get_bool_or("singletons.pre_instantiate", defaults.pre_instantiate_on_build),
        }
    }

    /// `FERROUS_WIRE_CIRCULAR_ALLOW`, `FERROUS_WIRE_TYPE_CHECK_EAGER`,
    /// `FERROUS_WIRE_CREATION_MAX_DEPTH`, `FERROUS_WIRE_SINGLETONS_PRE_INSTANTIATE`.
    pub fn from_env() -> Self {
        let mut provider = ConfigProvider::new();
        provider.add_source(Box::new(EnvironmentConfigSource::new()));
        Self::load(&provider)
    }

    /// Parses a JSON object with the field names of this struct.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::config("ContainerConfig", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_source_maps_dotted_keys() {
        env::set_var("WIRETEST_CREATION_MAX_DEPTH", "12");
        env::set_var("WIRETEST_CIRCULAR_ALLOW", "false");

        let source = EnvironmentConfigSource::with_prefix("wiretest");
        assert_eq!(source.get("creation.max_depth"), Some(ConfigValue::Integer(12)));
        assert_eq!(source.get("circular.allow"), Some(ConfigValue::Boolean(false)));

        env::remove_var("WIRETEST_CREATION_MAX_DEPTH");
        env::remove_var("WIRETEST_CIRCULAR_ALLOW");
    }

    #[test]
    fn first_source_wins_and_defaults_fill_gaps() {
        let mut provider = ConfigProvider::new();
        provider.add_source(Box::new(
            MapConfigSource::new().set("circular.allow", ConfigValue::Boolean(false)),
        ));
        provider.add_source(Box::new(
            MapConfigSource::new()
                .set("circular.allow", ConfigValue::Boolean(true))
                .set("creation.max_depth", ConfigValue::Integer(0)),
        ));

        let config = ContainerConfig::load(&provider);
        assert!(!config.allow_circular_references);
        assert_eq!(config.max_creation_depth, 1);
        assert!(config.allow_eager_type_check);
    }

    #[test]
    fn mismatched_values_fall_back() {
        let mut provider = ConfigProvider::new();
        provider.add_source(Box::new(
            MapConfigSource::new().set("type_check.eager", ConfigValue::String("maybe".into())),
        ));
        assert!(ContainerConfig::load(&provider).allow_eager_type_check);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_overrides_selected_fields() {
        let config = ContainerConfig::from_json(r#"{ "max_creation_depth": 8 }"#).unwrap();
        assert_eq!(config.max_creation_depth, 8);
        assert!(config.allow_circular_references);
        assert!(ContainerConfig::from_json("[").unwrap_err().is_configuration());
    }
}
