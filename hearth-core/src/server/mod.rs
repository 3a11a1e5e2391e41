//! Listener supervision.
//!
//! One listener per protocol, each started and stopped according to its
//! [`ServerMode`]: `Enabled` runs unconditionally, `Disabled` never runs
//! (registrations against it warn), `Dynamic` follows endpoint presence
//! through `awake_or_warn` / `sleep_if_not_needed` notifications from the
//! route registry.

pub mod http;
pub mod tls;
pub mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::dump::ErrorDump;
use crate::handler::ServerKind;

/// How a listener decides whether to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    Enabled,
    Disabled,
    /// Auto by endpoint presence.
    #[default]
    Dynamic,
}

impl std::str::FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enabled" => Ok(ServerMode::Enabled),
            "disabled" => Ok(ServerMode::Disabled),
            "dynamic" => Ok(ServerMode::Dynamic),
            other => Err(format!("unknown server mode '{other}'")),
        }
    }
}

/// Notifications the route registry sends when its contents change.
pub trait ServerControl: Send + Sync {
    /// Start the listener if dormant; warn if it is forcibly disabled.
    fn awake_or_warn(&self, kind: ServerKind);

    /// Stop a dynamic listener that no longer has anything to serve.
    fn sleep_if_not_needed(&self, kind: ServerKind);
}

/// TLS material for the listeners.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Listener configuration shared by both protocols.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub http_port: u16,
    pub ws_port: u16,
    pub http_mode: ServerMode,
    pub ws_mode: ServerMode,
    pub tls: Option<TlsSettings>,
    /// Honour client-advertised response encodings (compression).
    pub response_encoding: bool,
    /// Per-exchange deadline.
    pub request_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            http_port: 5000,
            ws_port: 5001,
            http_mode: ServerMode::default(),
            ws_mode: ServerMode::default(),
            tls: None,
            response_encoding: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct ListenerTask {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
    addr: SocketAddr,
}

/// Owns the two listeners and implements the registry's wake/sleep protocol.
pub struct ServerSupervisor {
    dispatcher: Dispatcher,
    config: ListenerConfig,
    dump: Arc<ErrorDump>,
    http: tokio::sync::Mutex<Option<ListenerTask>>,
    ws: tokio::sync::Mutex<Option<ListenerTask>>,
}

impl ServerSupervisor {
    pub fn new(dispatcher: Dispatcher, config: ListenerConfig, dump: Arc<ErrorDump>) -> Arc<Self> {
        Arc::new(ServerSupervisor {
            dispatcher,
            config,
            dump,
            http: tokio::sync::Mutex::new(None),
            ws: tokio::sync::Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    fn mode(&self, kind: ServerKind) -> ServerMode {
        match kind {
            ServerKind::Http => self.config.http_mode,
            ServerKind::WebSocket => self.config.ws_mode,
        }
    }

    fn slot(&self, kind: ServerKind) -> &tokio::sync::Mutex<Option<ListenerTask>> {
        match kind {
            ServerKind::Http => &self.http,
            ServerKind::WebSocket => &self.ws,
        }
    }

    /// Bring listeners in line with their modes and the current registry
    /// state. Called once at engine start.
    pub async fn sync(self: &Arc<Self>) {
        for kind in [ServerKind::Http, ServerKind::WebSocket] {
            match self.mode(kind) {
                ServerMode::Disabled => {}
                ServerMode::Enabled => self.start(kind).await,
                ServerMode::Dynamic => {
                    if self.dispatcher.registry().snapshot().needs(kind) {
                        self.start(kind).await;
                    }
                }
            }
        }
    }

    async fn start(self: &Arc<Self>, kind: ServerKind) {
        let mut slot = self.slot(kind).lock().await;
        if slot.is_some() {
            return;
        }
        let port = match kind {
            ServerKind::Http => self.config.http_port,
            ServerKind::WebSocket => self.config.ws_port,
        };
        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(l) => l,
            Err(e) => {
                self.dump
                    .capture(&format!("{kind} listener bind"), &e.to_string());
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(a) => a,
            Err(e) => {
                warn!("{kind} listener has no local address: {e}");
                return;
            }
        };
        let cancel = CancellationToken::new();
        let router = match kind {
            ServerKind::Http => http::http_router(
                self.dispatcher.clone(),
                &self.config,
                self.dump.clone(),
            ),
            ServerKind::WebSocket => ws::ws_router(
                self.dispatcher.clone(),
                &self.config,
            ),
        };
        let tls = self.config.tls.clone();
        let token = cancel.clone();
        let dump = self.dump.clone();
        let join = tokio::spawn(async move {
            let service =
                router.into_make_service_with_connect_info::<SocketAddr>();
            let served = match tls {
                Some(settings) => {
                    match tls::load_server_config(&settings.cert_path, &settings.key_path) {
                        Ok(config) => {
                            use axum::serve::ListenerExt;
                            axum::serve(
                                tls::TlsListener::new(listener, config).tap_io(|_io| {}),
                                service,
                            )
                            .with_graceful_shutdown(token.cancelled_owned())
                            .await
                        }
                        Err(e) => {
                            dump.capture(&format!("{kind} tls setup"), &e.to_string());
                            return;
                        }
                    }
                }
                None => {
                    axum::serve(listener, service)
                        .with_graceful_shutdown(token.cancelled_owned())
                        .await
                }
            };
            if let Err(e) = served {
                dump.capture(&format!("{kind} listener"), &e.to_string());
            }
        });
        info!("{kind} listener up on {addr}");
        *slot = Some(ListenerTask { cancel, join, addr });
    }

    async fn stop(&self, kind: ServerKind) {
        let task = self.slot(kind).lock().await.take();
        if let Some(task) = task {
            task.cancel.cancel();
            let _ = task.join.await;
            info!("{kind} listener stopped");
        }
    }

    /// Stop both listeners. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.stop(ServerKind::Http).await;
        self.stop(ServerKind::WebSocket).await;
    }

    /// Bound address of a running listener.
    pub async fn local_addr(&self, kind: ServerKind) -> Option<SocketAddr> {
        self.slot(kind).lock().await.as_ref().map(|t| t.addr)
    }

    pub async fn is_running(&self, kind: ServerKind) -> bool {
        self.slot(kind).lock().await.is_some()
    }
}

impl ServerControl for Arc<ServerSupervisor> {
    fn awake_or_warn(&self, kind: ServerKind) {
        match self.mode(kind) {
            ServerMode::Disabled => {
                warn!("{kind} server is forcibly disabled; new registrations will not be served");
            }
            ServerMode::Enabled | ServerMode::Dynamic => {
                let this = self.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move { this.start(kind).await });
                }
            }
        }
    }

    fn sleep_if_not_needed(&self, kind: ServerKind) {
        if self.mode(kind) != ServerMode::Dynamic {
            return;
        }
        let this = self.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if !this.dispatcher.registry().snapshot().needs(kind) {
                    this.stop(kind).await;
                }
            });
        }
    }
}
