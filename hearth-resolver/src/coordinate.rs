//! Artifact coordinates: `groupId:artifactId:version[:classifier]`.

use crate::ResolverError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
}

impl ArtifactCoordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        ArtifactCoordinate {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ResolverError> {
        let parts: Vec<&str> = input.trim().split(':').collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(ResolverError::InvalidCoordinate(input.to_string()));
        }
        Ok(ArtifactCoordinate {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
        })
    }

    /// Repository-relative directory of this coordinate's files.
    pub fn repo_dir(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version
        )
    }

    /// File name of the main artifact for the given extension.
    pub fn file_name(&self, extension: &str) -> String {
        match &self.classifier {
            Some(classifier) => {
                format!("{}-{}-{}.{}", self.artifact, self.version, classifier, extension)
            }
            None => format!("{}-{}.{}", self.artifact, self.version, extension),
        }
    }

    /// File name of the dependency-metadata document.
    pub fn pom_name(&self) -> String {
        format!("{}-{}.pom", self.artifact, self.version)
    }

    /// Identity without the classifier, used for transitive cycle breaking.
    pub fn base_key(&self) -> String {
        format!("{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl std::fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.classifier {
            Some(classifier) => write!(
                f,
                "{}:{}:{}:{}",
                self.group, self.artifact, self.version, classifier
            ),
            None => write!(f, "{}:{}:{}", self.group, self.artifact, self.version),
        }
    }
}
