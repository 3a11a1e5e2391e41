//! Remote artifact repositories.

use url::Url;

use crate::coordinate::ArtifactCoordinate;

/// Base URL of Maven Central, always part of the working set.
pub const CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2";

/// One artifact repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    name: String,
    url: Url,
    default: bool,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Repository {
            name: name.into(),
            url,
            default: false,
        }
    }

    pub(crate) fn default_set() -> Vec<Repository> {
        let central = Url::parse(CENTRAL_URL).expect("central url is valid");
        vec![Repository {
            name: "central".to_string(),
            url: central,
            default: true,
        }]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether this repository belongs to the built-in default set.
    pub fn is_default(&self) -> bool {
        self.default
    }

    /// Absolute URL of a file belonging to a coordinate.
    pub fn file_url(&self, coordinate: &ArtifactCoordinate, file: &str) -> Result<Url, url::ParseError> {
        let base = self.url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}/{}", base, coordinate.repo_dir(), file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_join_repo_layout() {
        let repo = Repository::new("test", Url::parse("https://repo.example/m2/").unwrap());
        let coord = ArtifactCoordinate::parse("org.example:widget:1.0").unwrap();
        let url = repo.file_url(&coord, "widget-1.0.pom").unwrap();
        assert_eq!(
            url.as_str(),
            "https://repo.example/m2/org/example/widget/1.0/widget-1.0.pom"
        );
    }

    #[test]
    fn default_set_contains_central() {
        let defaults = Repository::default_set();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].name(), "central");
        assert!(defaults[0].is_default());
    }
}
