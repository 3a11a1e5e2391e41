//! Registered endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::handler::{DescriptorSet, EntryKind, HandlerEntry, Priority};
use crate::url::CompiledPattern;

/// A compiled pattern bound to an entry point on a handler, annotated with a
/// priority and the requirement values harvested at registration time.
///
/// Endpoints are immutable once published; requirement reprocessing replaces
/// them wholesale under the registry's copy-on-write discipline.
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: u64,
    kind: EntryKind,
    priority: Priority,
    method: &'static str,
    pattern: Arc<CompiledPattern>,
    requirements: BTreeMap<String, Vec<String>>,
    /// Handler-level and route-level descriptor values, merged; the source
    /// requirement reprocessing harvests from.
    declared: DescriptorSet,
    entry: HandlerEntry,
}

impl Endpoint {
    pub(crate) fn new(
        id: u64,
        kind: EntryKind,
        priority: Priority,
        method: &'static str,
        pattern: Arc<CompiledPattern>,
        requirements: BTreeMap<String, Vec<String>>,
        declared: DescriptorSet,
        entry: HandlerEntry,
    ) -> Self {
        Endpoint {
            id,
            kind,
            priority,
            method,
            pattern,
            requirements,
            declared,
            entry,
        }
    }

    /// Registration sequence number; the stable secondary sort after priority.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Name of the target entry point on the handler.
    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn pattern(&self) -> &Arc<CompiledPattern> {
        &self.pattern
    }

    /// Requirement kind → configured values, duplicates removed.
    pub fn requirements(&self) -> &BTreeMap<String, Vec<String>> {
        &self.requirements
    }

    pub fn requirement_values(&self, kind: &str) -> &[String] {
        self.requirements.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The descriptor values the handler and route declared, merged.
    pub fn declared(&self) -> &DescriptorSet {
        &self.declared
    }

    pub fn entry(&self) -> &HandlerEntry {
        &self.entry
    }

    pub(crate) fn with_requirements(&self, requirements: BTreeMap<String, Vec<String>>) -> Self {
        let mut next = self.clone();
        next.requirements = requirements;
        next
    }
}
