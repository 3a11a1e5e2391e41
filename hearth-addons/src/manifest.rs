//! Addon manifests (`addon.json`).

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::AddonError;

/// Parsed `addon.json`. Unknown fields are ignored; `name` is the only
/// required field and must be plain alphanumeric.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddonManifest {
    #[serde(default)]
    pub name: String,
    /// Component name of the addon entry point; blank means a hollow
    /// placeholder instance.
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub authors: Vec<String>,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub soft_depends: Vec<String>,
    /// Additional artifact repositories, added to the resolver working set.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Artifact coordinates this addon pulls in.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl AddonManifest {
    /// Parse and validate manifest JSON.
    pub fn parse(source: &str, text: &str) -> Result<Self, AddonError> {
        let manifest: AddonManifest =
            serde_json::from_str(text).map_err(|e| AddonError::ManifestMalformed {
                source: source.to_string(),
                reason: e.to_string(),
            })?;
        manifest.validate(source)?;
        Ok(manifest)
    }

    fn validate(&self, source: &str) -> Result<(), AddonError> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AddonError::ManifestMalformed {
                source: source.to_string(),
                reason: format!("name '{}' must match [A-Za-z0-9]+", self.name),
            });
        }
        Ok(())
    }

    /// Whether `other` is declared as a hard or soft dependency.
    pub fn declares_dependency(&self, other: &str) -> bool {
        let matches = |list: &[String]| list.iter().any(|d| d.eq_ignore_ascii_case(other));
        matches(&self.depends) || matches(&self.soft_depends)
    }
}

/// `authors` accepts both a single string and a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer) {
        Ok(OneOrMany::One(author)) => Ok(vec![author]),
        Ok(OneOrMany::Many(authors)) => Ok(authors),
        Err(_) => Err(de::Error::custom("authors must be a string or a list of strings")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let manifest = AddonManifest::parse(
            "test",
            r#"{
                "name": "Chat",
                "main": "com.example.chat.ChatAddon",
                "description": "chat rooms",
                "authors": ["alice", "bob"],
                "website": "https://example.com",
                "version": "1.2.0",
                "depends": ["Base"],
                "softDepends": ["Metrics"],
                "repositories": ["https://repo.example/m2"],
                "dependencies": ["org.example:rooms:1.0"],
                "unknownField": 42
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "Chat");
        assert_eq!(manifest.authors, ["alice", "bob"]);
        assert_eq!(manifest.depends, ["Base"]);
        assert_eq!(manifest.soft_depends, ["Metrics"]);
    }

    #[test]
    fn single_author_string_is_accepted() {
        let manifest =
            AddonManifest::parse("test", r#"{"name": "Solo", "authors": "alice"}"#).unwrap();
        assert_eq!(manifest.authors, ["alice"]);
    }

    #[test]
    fn name_is_required_and_alphanumeric() {
        assert!(AddonManifest::parse("test", r#"{}"#).is_err());
        assert!(AddonManifest::parse("test", r#"{"name": "has space"}"#).is_err());
        assert!(AddonManifest::parse("test", r#"{"name": "has-dash"}"#).is_err());
        assert!(AddonManifest::parse("test", r#"{"name": "Ok123"}"#).is_ok());
    }

    #[test]
    fn dependency_declaration_is_case_insensitive() {
        let manifest = AddonManifest::parse(
            "test",
            r#"{"name": "A", "depends": ["Base"], "softDepends": ["metrics"]}"#,
        )
        .unwrap();
        assert!(manifest.declares_dependency("base"));
        assert!(manifest.declares_dependency("METRICS"));
        assert!(!manifest.declares_dependency("other"));
    }
}
