use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::ConfigError;

/// Load a YAML file into flattened dot-separated keys. A missing file is not
/// an error; parse failures are.
pub fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ConfigError::Load(format!("{}: {e}", path.display()))),
    };
    load_yaml_str(&text, values)
}

/// Load a YAML document string into flattened dot-separated keys.
pub fn load_yaml_str(
    text: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten("", &doc, values);
    Ok(())
}

fn flatten(prefix: &str, node: &serde_yaml::Value, values: &mut HashMap<String, ConfigValue>) {
    match node {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = key.as_str() else { continue };
                let full = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&full, value, values);
            }
        }
        other => {
            if let Some(value) = convert(other) {
                values.insert(prefix.to_string(), value);
            }
        }
    }
}

fn convert(node: &serde_yaml::Value) -> Option<ConfigValue> {
    match node {
        serde_yaml::Value::String(s) => Some(ConfigValue::String(s.clone())),
        serde_yaml::Value::Bool(b) => Some(ConfigValue::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(ConfigValue::Integer(i))
            } else {
                n.as_f64().map(ConfigValue::Float)
            }
        }
        serde_yaml::Value::Sequence(items) => Some(ConfigValue::List(
            items.iter().filter_map(convert).collect(),
        )),
        _ => None,
    }
}
