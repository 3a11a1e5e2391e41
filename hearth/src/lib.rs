//! Hearth, an embeddable network-service framework.
//!
//! One [`Hearth`] handle co-hosts an HTTP server and a WebSocket server over
//! a single route-dispatch engine, and drives a dynamic addon subsystem with
//! isolated code spaces and declarative artifact resolution.
//!
//! ```no_run
//! use hearth::{HearthBuilder, telemetry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     telemetry::init_tracing(false);
//!     let hearth = Arc::new(HearthBuilder::new().http_port(8080).build());
//!     hearth.start().await.expect("startup");
//!     hearth.run_until_signal().await;
//! }
//! ```

pub mod builder;
pub mod runtime;
pub mod telemetry;
pub mod version;

pub use builder::{HearthBuilder, Settings};
pub use runtime::{Hearth, StartError};

pub use hearth_addons::{
    Addon, AddonContext, AddonEngine, AddonError, AddonManifest, Constructed, LoaderState,
    ServiceLoader,
};
pub use hearth_core::{
    CoreError, DescriptorSet, Dispatcher, EndpointCall, EntryKind, ExchangeHead, FramePayload,
    Handler, HandlerError, HearthConfig, HttpExchange, Priority, Requirement, RequestHandler,
    RouteRegistry, RouteSpec, ServerKind, ServerMode, SocketBroadcaster, SocketExchange,
    SocketHandler, SocketRooms,
};
pub use hearth_resolver::{ArtifactCoordinate, ArtifactResolver, Repository};
