//! Dependency metadata: the POM subset the resolver honours.
//!
//! Only `packaging` and the `dependencies` list matter here. Scope rules:
//! `test` and `provided` are excluded, as are `optional` entries.
//! Version-less entries (managed versions in full Maven) are skipped with a
//! diagnostic rather than resolved.

use serde::Deserialize;
use tracing::debug;

use crate::coordinate::ArtifactCoordinate;
use crate::ResolverError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomProject {
    packaging: Option<String>,
    dependencies: Option<PomDependencies>,
}

#[derive(Debug, Deserialize)]
struct PomDependencies {
    #[serde(default, rename = "dependency")]
    entries: Vec<PomDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    version: Option<String>,
    classifier: Option<String>,
    scope: Option<String>,
    optional: Option<String>,
}

/// Parsed metadata for one artifact.
#[derive(Debug)]
pub struct ArtifactMetadata {
    packaging: String,
    dependencies: Vec<ArtifactCoordinate>,
}

impl ArtifactMetadata {
    /// Parse a POM document and apply the scope rules.
    pub fn parse(owner: &ArtifactCoordinate, xml: &str) -> Result<Self, ResolverError> {
        let project: PomProject =
            quick_xml::de::from_str(xml).map_err(|e| ResolverError::Unresolved {
                coordinate: owner.to_string(),
                reason: format!("metadata parse failed: {e}"),
            })?;
        let mut dependencies = Vec::new();
        for dep in project.dependencies.map(|d| d.entries).unwrap_or_default() {
            if matches!(dep.scope.as_deref(), Some("test") | Some("provided")) {
                continue;
            }
            if dep.optional.as_deref() == Some("true") {
                continue;
            }
            let Some(version) = dep.version else {
                debug!(
                    owner = %owner,
                    dependency = format!("{}:{}", dep.group_id, dep.artifact_id),
                    "skipping dependency without an explicit version"
                );
                continue;
            };
            dependencies.push(ArtifactCoordinate {
                group: dep.group_id,
                artifact: dep.artifact_id,
                version,
                classifier: dep.classifier,
            });
        }
        Ok(ArtifactMetadata {
            packaging: project.packaging.unwrap_or_else(|| "jar".to_string()),
            dependencies,
        })
    }

    /// File extension of the main artifact.
    pub fn extension(&self) -> &str {
        match self.packaging.as_str() {
            // `bundle` and friends still ship a jar file.
            "bundle" | "maven-plugin" => "jar",
            other => other,
        }
    }

    pub fn dependencies(&self) -> &[ArtifactCoordinate] {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ArtifactCoordinate {
        ArtifactCoordinate::parse("org.example:widget:1.0").unwrap()
    }

    #[test]
    fn parses_packaging_and_dependencies() {
        let xml = r#"
            <project>
              <packaging>tar.gz</packaging>
              <dependencies>
                <dependency>
                  <groupId>org.example</groupId>
                  <artifactId>base</artifactId>
                  <version>2.0</version>
                </dependency>
              </dependencies>
            </project>"#;
        let meta = ArtifactMetadata::parse(&owner(), xml).unwrap();
        assert_eq!(meta.extension(), "tar.gz");
        assert_eq!(meta.dependencies().len(), 1);
        assert_eq!(meta.dependencies()[0].to_string(), "org.example:base:2.0");
    }

    #[test]
    fn defaults_to_jar_packaging() {
        let meta = ArtifactMetadata::parse(&owner(), "<project></project>").unwrap();
        assert_eq!(meta.extension(), "jar");
        assert!(meta.dependencies().is_empty());
    }

    #[test]
    fn excludes_test_provided_and_optional() {
        let xml = r#"
            <project>
              <dependencies>
                <dependency>
                  <groupId>g</groupId><artifactId>kept</artifactId><version>1</version>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>tested</artifactId><version>1</version>
                  <scope>test</scope>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>provided</artifactId><version>1</version>
                  <scope>provided</scope>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>maybe</artifactId><version>1</version>
                  <optional>true</optional>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>managed</artifactId>
                </dependency>
              </dependencies>
            </project>"#;
        let meta = ArtifactMetadata::parse(&owner(), xml).unwrap();
        let names: Vec<_> = meta.dependencies().iter().map(|d| d.artifact.clone()).collect();
        assert_eq!(names, ["kept"]);
    }
}
