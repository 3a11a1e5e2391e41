pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod dump;
pub mod endpoint;
pub mod error;
pub mod exchange;
pub mod fallback;
pub mod handler;
pub mod registry;
pub mod requirement;
pub mod server;
pub mod url;

pub use broadcast::{SocketBroadcaster, SocketRooms};
pub use config::{ConfigError, ConfigValue, HearthConfig};
pub use dispatch::{Candidate, Dispatcher, HttpDispatch, Selection, SocketDispatch};
pub use dump::ErrorDump;
pub use endpoint::Endpoint;
pub use error::{CoreError, HandlerError};
pub use exchange::{ExchangeHead, FramePayload, HttpExchange, SocketExchange};
pub use handler::{
    DescriptorSet, EndpointCall, EntryKind, Handler, HandlerEntry, Priority, RequestHandler,
    RouteSpec, ServerKind, SocketHandler,
};
pub use registry::{RouteRegistry, RouteTable, ShareMount};
pub use requirement::{Requirement, RequirementRegistry};
pub use server::{
    ListenerConfig, ServerControl, ServerMode, ServerSupervisor, TlsSettings,
};
