//! URL canonicalisation and pattern compilation.
//!
//! Route templates use `{name}` to denote a named path segment. A template is
//! canonicalised (trimmed, leading `/` ensured, `//` runs collapsed, trailing
//! `/` stripped) and compiled into an anchored, case-insensitive regex where
//! every `{name}` becomes a named group matching one segment. Two templates
//! are the same route iff their canonical strings are equal.

use std::sync::Arc;

use regex::Regex;

use crate::error::CoreError;

/// Canonicalise a path or template string.
///
/// Rules, in order: trim whitespace; ensure a leading `/`; collapse runs of
/// `/`; strip the trailing `/` (the root stays `/`).
pub fn canonicalise(path: &str) -> String {
    let trimmed = path.trim();
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push('/');
    let mut prev_slash = true;
    for c in trimmed.chars() {
        if c == '/' {
            if !prev_slash {
                out.push('/');
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Join a handler-level parent template with a per-route child template.
pub fn merge(parent: &str, child: &str) -> String {
    canonicalise(&format!("{}/{}", parent.trim(), child.trim()))
}

/// Captured values of a pattern's named groups, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A compiled route pattern.
///
/// Matching is case-insensitive and accepts an optional trailing `/`; the
/// input is canonicalised before it is tested. The registry deduplicates
/// patterns by canonical string, so two equal templates share one instance.
#[derive(Debug)]
pub struct CompiledPattern {
    canonical: String,
    regex: Regex,
    groups: Vec<String>,
}

impl CompiledPattern {
    /// Compile a route template.
    pub fn compile(template: &str) -> Result<Arc<Self>, CoreError> {
        Self::build(template, false)
    }

    /// Compile a share-mount template: `<template>/?(.*)`, where the tail
    /// group names the file relative to the share root.
    pub fn compile_share(template: &str) -> Result<Arc<Self>, CoreError> {
        Self::build(template, true)
    }

    fn build(template: &str, share_tail: bool) -> Result<Arc<Self>, CoreError> {
        let canonical = canonicalise(template);
        let mut groups = Vec::new();
        let mut body = String::from("(?i)^");
        for segment in canonical.split('/').skip(1) {
            body.push('/');
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                if name.is_empty()
                    || !name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                    || name.chars().next().is_some_and(|c| c.is_ascii_digit())
                {
                    return Err(CoreError::InvalidPattern {
                        template: template.to_string(),
                        reason: format!("'{{{name}}}' is not a valid group name"),
                    });
                }
                if groups.iter().any(|g| g == name) {
                    return Err(CoreError::InvalidPattern {
                        template: template.to_string(),
                        reason: format!("duplicate group '{{{name}}}'"),
                    });
                }
                body.push_str(&format!("(?P<{name}>[^/]+)"));
                groups.push(name.to_string());
            } else {
                body.push_str(&regex::escape(segment));
            }
        }
        if share_tail {
            body.push_str("/?(?P<tail>.*)$");
        } else {
            body.push_str("/?$");
        }
        let regex = Regex::new(&body).map_err(|e| CoreError::InvalidPattern {
            template: template.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(CompiledPattern {
            canonical,
            regex,
            groups,
        }))
    }

    /// The canonical template string this pattern was compiled from.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Named groups in order of appearance.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Match an input path, canonicalising it first.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let canon = canonicalise(path);
        let caps = self.regex.captures(&canon)?;
        let params = self
            .groups
            .iter()
            .filter_map(|g| caps.name(g).map(|m| (g.clone(), m.as_str().to_string())))
            .collect();
        Some(PathParams(params))
    }

    /// Match a share-mount input, returning the tail (relative file name).
    pub fn matches_share(&self, path: &str) -> Option<(PathParams, String)> {
        let canon = canonicalise(path);
        let caps = self.regex.captures(&canon)?;
        let tail = caps.name("tail")?.as_str().to_string();
        let params = self
            .groups
            .iter()
            .filter_map(|g| caps.name(g).map(|m| (g.clone(), m.as_str().to_string())))
            .collect();
        Some((PathParams(params), tail))
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for CompiledPattern {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalise_collapses_and_strips() {
        assert_eq!(canonicalise("//a///b/"), "/a/b");
        assert_eq!(canonicalise("a/b"), "/a/b");
        assert_eq!(canonicalise("  /a/b  "), "/a/b");
        assert_eq!(canonicalise(""), "/");
        assert_eq!(canonicalise("/"), "/");
    }

    #[test]
    fn canonicalise_is_idempotent() {
        for p in ["//x//y/", "plain", "/", "", "/a/{b}/c/"] {
            let once = canonicalise(p);
            assert_eq!(canonicalise(&once), once);
        }
    }

    #[test]
    fn named_groups_in_order() {
        let p = CompiledPattern::compile("/foo/{name}/bar/{id}").unwrap();
        assert_eq!(p.groups(), ["name", "id"]);
        let params = p.matches("/foo/alice/bar/42").unwrap();
        assert_eq!(params.get("name"), Some("alice"));
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn match_is_case_insensitive_with_optional_trailing_slash() {
        let p = CompiledPattern::compile("/Foo/Bar").unwrap();
        assert!(p.matches("/foo/bar").is_some());
        assert!(p.matches("/FOO/BAR/").is_some());
        assert!(p.matches("/foo/bar/baz").is_none());
    }

    #[test]
    fn group_matches_exactly_one_segment() {
        let p = CompiledPattern::compile("/u/{id}").unwrap();
        assert!(p.matches("/u/7").is_some());
        assert!(p.matches("/u/7/extra").is_none());
        assert!(p.matches("/u").is_none());
    }

    #[test]
    fn invalid_group_names_are_rejected() {
        assert!(CompiledPattern::compile("/x/{}").is_err());
        assert!(CompiledPattern::compile("/x/{a-b}").is_err());
        assert!(CompiledPattern::compile("/x/{1a}").is_err());
        assert!(CompiledPattern::compile("/{a}/{a}").is_err());
    }

    #[test]
    fn share_pattern_captures_tail() {
        let p = CompiledPattern::compile_share("/static").unwrap();
        let (_, tail) = p.matches_share("/static/css/site.css").unwrap();
        assert_eq!(tail, "css/site.css");
        let (_, tail) = p.matches_share("/static").unwrap();
        assert_eq!(tail, "");
        assert!(p.matches_share("/other/file").is_none());
    }

    #[test]
    fn merge_joins_and_canonicalises() {
        assert_eq!(merge("/api/", "/v1/users/"), "/api/v1/users");
        assert_eq!(merge("", "health"), "/health");
    }
}
