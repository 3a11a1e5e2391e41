use super::ConfigError;

/// A scalar or list configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Conversion from a [`ConfigValue`] into a typed value.
///
/// String values are coerced where unambiguous (env overlays always arrive
/// as strings).
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(x) => Ok(x.to_string()),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            ConfigValue::List(_) => Err(mismatch(key, "string")),
        }
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s.parse().map_err(|_| mismatch(key, "integer")),
            _ => Err(mismatch(key, "integer")),
        }
    }
}

impl FromConfigValue for u16 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let wide = i64::from_config_value(value, key)?;
        u16::try_from(wide).map_err(|_| mismatch(key, "port number"))
    }
}

impl FromConfigValue for usize {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let wide = i64::from_config_value(value, key)?;
        usize::try_from(wide).map_err(|_| mismatch(key, "unsigned integer"))
    }
}

impl FromConfigValue for u32 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let wide = i64::from_config_value(value, key)?;
        u32::try_from(wide).map_err(|_| mismatch(key, "unsigned integer"))
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Float(x) => Ok(*x),
            ConfigValue::Integer(i) => Ok(*i as f64),
            ConfigValue::String(s) => s.parse().map_err(|_| mismatch(key, "float")),
            _ => Err(mismatch(key, "float")),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Bool(b) => Ok(*b),
            ConfigValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(mismatch(key, "bool")),
            },
            _ => Err(mismatch(key, "bool")),
        }
    }
}

impl FromConfigValue for Vec<String> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::List(items) => items
                .iter()
                .map(|v| String::from_config_value(v, key))
                .collect(),
            ConfigValue::String(s) => Ok(s.split(',').map(|p| p.trim().to_string()).collect()),
            _ => Err(mismatch(key, "list of strings")),
        }
    }
}
