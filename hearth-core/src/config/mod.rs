//! Configuration loaded from YAML files, `.env` files, and environment
//! variables.
//!
//! Resolution order (lowest to highest priority):
//! 1. `hearth.yaml` (base)
//! 2. `hearth-{profile}.yaml` (profile override)
//! 3. `.env` / `.env.{profile}` files (loaded into the process environment,
//!    never overwriting already-set variables)
//! 4. Environment variables (`HEARTH_HTTP_PORT` overrides `hearth.http.port`)
//!
//! Profile is `HEARTH_PROFILE` when set, the argument otherwise.

mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use value::{ConfigValue, FromConfigValue};

#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Flattened key-value view over the configuration sources.
#[derive(Debug, Clone)]
pub struct HearthConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl HearthConfig {
    /// Load configuration for the given profile from the working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        let active = std::env::var("HEARTH_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(Path::new("hearth.yaml"), &mut values)?;
        let profile_path = format!("hearth-{active}.yaml");
        loader::load_yaml_file(Path::new(&profile_path), &mut values)?;

        let _ = dotenvy::dotenv();
        let _ = dotenvy::from_filename(format!(".env.{active}"));

        // Convention: `hearth.http.port` <-> `HEARTH_HTTP_PORT`.
        for (env_key, env_val) in std::env::vars() {
            let config_key = env_key.to_lowercase().replace('_', ".");
            values.insert(config_key, ConfigValue::String(env_val));
        }

        Ok(HearthConfig {
            values,
            profile: active,
        })
    }

    /// Build a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(HearthConfig {
            values,
            profile: profile.to_string(),
        })
    }

    pub fn empty() -> Self {
        HearthConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for the given dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, falling back to a default when the key is missing.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_keys_flatten_to_dotted_paths() {
        let config = HearthConfig::from_yaml_str(
            "hearth:\n  http:\n    port: 8080\n  debug: true\n  addons:\n    directory: ./addons\n",
            "test",
        )
        .unwrap();
        assert_eq!(config.get::<u16>("hearth.http.port").unwrap(), 8080);
        assert!(config.get::<bool>("hearth.debug").unwrap());
        assert_eq!(
            config.get::<String>("hearth.addons.directory").unwrap(),
            "./addons"
        );
    }

    #[test]
    fn string_values_coerce() {
        let mut config = HearthConfig::empty();
        config.set("port", ConfigValue::String("9000".into()));
        config.set("flag", ConfigValue::String("on".into()));
        assert_eq!(config.get::<u16>("port").unwrap(), 9000);
        assert!(config.get::<bool>("flag").unwrap());
    }

    #[test]
    fn missing_key_is_not_found() {
        let config = HearthConfig::empty();
        assert!(matches!(
            config.get::<String>("nope"),
            Err(ConfigError::NotFound(_))
        ));
        assert_eq!(config.get_or("nope", 3_i64), 3);
    }
}
