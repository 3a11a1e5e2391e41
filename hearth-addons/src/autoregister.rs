//! Auto-register descriptors and the processors that consume them.
//!
//! Descriptors harvested from an addon archive are processed during the
//! addon's LOAD or ENABLE phase. A processor is selected by the descriptor's
//! kind; the built-in processors cover route handlers and requirement
//! predicates.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use hearth_core::handler::ServerKind;

use crate::addon::AddonContext;
use crate::component::{Constructed, Phase};
use crate::AddonError;

/// One harvested auto-register entry.
#[derive(Debug, Clone)]
pub struct AutoRegisterDescriptor {
    pub kind: String,
    /// Component name to resolve through the addon's code space.
    pub target: String,
    pub phase: Phase,
    /// Marker data, passed through to the processor.
    pub data: serde_json::Value,
}

/// Consumes descriptors of one kind.
pub trait AutoRegisterProcessor: Send + Sync {
    fn kind(&self) -> &str;

    fn process(
        &self,
        ctx: &AddonContext,
        constructed: Constructed,
        data: &serde_json::Value,
    ) -> Result<(), AddonError>;
}

/// Processor registry, keyed by descriptor kind. Starts with the built-in
/// handler and requirement processors.
pub struct ProcessorRegistry {
    processors: DashMap<String, Arc<dyn AutoRegisterProcessor>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        let registry = ProcessorRegistry {
            processors: DashMap::new(),
        };
        registry.register(Arc::new(HandlerProcessor));
        registry.register(Arc::new(RequirementProcessor));
        registry
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, processor: Arc<dyn AutoRegisterProcessor>) {
        self.processors
            .insert(processor.kind().to_string(), processor);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn AutoRegisterProcessor>> {
        let processor = self.processors.get(kind).map(|p| p.clone());
        if processor.is_none() {
            debug!(kind, "no auto-register processor for this kind, descriptor skipped");
        }
        processor
    }
}

// ── Built-in processors ─────────────────────────────────────────────────

/// Registers constructed handlers into the route registry.
struct HandlerProcessor;

impl AutoRegisterProcessor for HandlerProcessor {
    fn kind(&self) -> &str {
        "handler"
    }

    fn process(
        &self,
        ctx: &AddonContext,
        constructed: Constructed,
        _data: &serde_json::Value,
    ) -> Result<(), AddonError> {
        match constructed {
            Constructed::Handler(handler) => {
                ctx.register_handler(handler).map_err(|e| AddonError::AutoRegister {
                    addon: ctx.name().to_string(),
                    reason: e.to_string(),
                })
            }
            other => Err(AddonError::AutoRegister {
                addon: ctx.name().to_string(),
                reason: format!("handler descriptor constructed {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequirementData {
    #[serde(default)]
    server_kind: Option<String>,
    #[serde(default)]
    reprocess: bool,
}

/// Registers constructed requirement predicates.
struct RequirementProcessor;

impl AutoRegisterProcessor for RequirementProcessor {
    fn kind(&self) -> &str {
        "requirement"
    }

    fn process(
        &self,
        ctx: &AddonContext,
        constructed: Constructed,
        data: &serde_json::Value,
    ) -> Result<(), AddonError> {
        let options: RequirementData =
            serde_json::from_value(data.clone()).unwrap_or_default();
        match constructed {
            Constructed::Requirement {
                server_kind,
                requirement,
            } => {
                // The marker may override the factory's server kind.
                let kind = match options.server_kind.as_deref() {
                    Some("http") => ServerKind::Http,
                    Some("websocket") => ServerKind::WebSocket,
                    _ => server_kind,
                };
                ctx.register_requirement(kind, requirement, options.reprocess);
                Ok(())
            }
            other => Err(AddonError::AutoRegister {
                addon: ctx.name().to_string(),
                reason: format!("requirement descriptor constructed {other:?}"),
            }),
        }
    }
}
