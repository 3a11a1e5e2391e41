//! The application builder.
//!
//! Every enumerated engine option is a chainable method, and the whole set
//! can be populated from a [`HearthConfig`] (`hearth.yaml` + environment).

use std::path::PathBuf;
use std::time::Duration;

use hearth_core::config::HearthConfig;
use hearth_core::server::{ListenerConfig, ServerMode, TlsSettings};

use crate::runtime::Hearth;

/// Resolved settings, as consumed by [`Hearth`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub http_port: u16,
    pub ws_port: u16,
    pub http_mode: ServerMode,
    pub ws_mode: ServerMode,
    /// Whether the addon engine runs at all.
    pub addons: bool,
    pub addon_directory: PathBuf,
    pub library_directory: PathBuf,
    pub log_directory: PathBuf,
    pub ssl: bool,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub debug: bool,
    pub skip_default_route: bool,
    /// Session-store capacity handed to the session layer.
    pub session_cache: usize,
    /// Honour client-advertised response encodings.
    pub response_encoding: bool,
    pub skip_version_check: bool,
    /// Max retained rotated log files for the logging front-end; 0 disables.
    pub log_rotate: u32,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            http_port: 5000,
            ws_port: 5001,
            http_mode: ServerMode::default(),
            ws_mode: ServerMode::default(),
            addons: true,
            addon_directory: PathBuf::from("./addons"),
            library_directory: PathBuf::from("./libraries"),
            log_directory: PathBuf::from("./logs"),
            ssl: false,
            tls_cert: None,
            tls_key: None,
            debug: false,
            skip_default_route: false,
            session_cache: 1024,
            response_encoding: false,
            skip_version_check: false,
            log_rotate: 5,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Settings {
    pub(crate) fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            http_port: self.http_port,
            ws_port: self.ws_port,
            http_mode: self.http_mode,
            ws_mode: self.ws_mode,
            tls: match (self.ssl, &self.tls_cert, &self.tls_key) {
                (true, Some(cert), Some(key)) => Some(TlsSettings {
                    cert_path: cert.clone(),
                    key_path: key.clone(),
                }),
                _ => None,
            },
            response_encoding: self.response_encoding,
            request_timeout: self.request_timeout,
        }
    }
}

/// Builder for a [`Hearth`] instance.
#[derive(Debug, Default)]
pub struct HearthBuilder {
    settings: Settings,
}

impl HearthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the builder from configuration keys under `hearth.*`.
    pub fn from_config(config: &HearthConfig) -> Self {
        let defaults = Settings::default();
        let mode = |key: &str, fallback: ServerMode| {
            config
                .get::<String>(key)
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(fallback)
        };
        let settings = Settings {
            http_port: config.get_or("hearth.http.port", defaults.http_port),
            ws_port: config.get_or("hearth.ws.port", defaults.ws_port),
            http_mode: mode("hearth.http.mode", defaults.http_mode),
            ws_mode: mode("hearth.ws.mode", defaults.ws_mode),
            addons: config.get_or("hearth.addons.enabled", defaults.addons),
            addon_directory: config
                .get::<String>("hearth.addons.directory")
                .map(PathBuf::from)
                .unwrap_or(defaults.addon_directory),
            library_directory: config
                .get::<String>("hearth.libraries.directory")
                .map(PathBuf::from)
                .unwrap_or(defaults.library_directory),
            log_directory: config
                .get::<String>("hearth.logs.directory")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_directory),
            ssl: config.get_or("hearth.ssl.enabled", defaults.ssl),
            tls_cert: config
                .get::<String>("hearth.ssl.cert")
                .map(PathBuf::from)
                .ok(),
            tls_key: config
                .get::<String>("hearth.ssl.key")
                .map(PathBuf::from)
                .ok(),
            debug: config.get_or("hearth.debug", defaults.debug),
            skip_default_route: config
                .get_or("hearth.skip-default-route", defaults.skip_default_route),
            session_cache: config.get_or("hearth.session-cache", defaults.session_cache),
            response_encoding: config
                .get_or("hearth.response-encoding", defaults.response_encoding),
            skip_version_check: config
                .get_or("hearth.skip-version-check", defaults.skip_version_check),
            log_rotate: config.get_or("hearth.log-rotate", defaults.log_rotate),
            request_timeout: Duration::from_millis(
                config.get_or("hearth.request-timeout-ms", 30_000_u32) as u64,
            ),
        };
        HearthBuilder { settings }
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.settings.http_port = port;
        self
    }

    pub fn ws_port(mut self, port: u16) -> Self {
        self.settings.ws_port = port;
        self
    }

    pub fn http_mode(mut self, mode: ServerMode) -> Self {
        self.settings.http_mode = mode;
        self
    }

    pub fn ws_mode(mut self, mode: ServerMode) -> Self {
        self.settings.ws_mode = mode;
        self
    }

    /// Disable the addon engine entirely.
    pub fn addons(mut self, enabled: bool) -> Self {
        self.settings.addons = enabled;
        self
    }

    pub fn addon_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.addon_directory = dir.into();
        self
    }

    pub fn library_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.library_directory = dir.into();
        self
    }

    pub fn log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.log_directory = dir.into();
        self
    }

    /// Enable TLS on both listeners with the given PEM files.
    pub fn ssl(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.settings.ssl = true;
        self.settings.tls_cert = Some(cert.into());
        self.settings.tls_key = Some(key.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.settings.debug = debug;
        self
    }

    /// Do not install the fallback route when nothing is registered.
    pub fn skip_default_route(mut self, skip: bool) -> Self {
        self.settings.skip_default_route = skip;
        self
    }

    pub fn session_cache(mut self, capacity: usize) -> Self {
        self.settings.session_cache = capacity;
        self
    }

    pub fn response_encoding(mut self, enabled: bool) -> Self {
        self.settings.response_encoding = enabled;
        self
    }

    pub fn skip_version_check(mut self, skip: bool) -> Self {
        self.settings.skip_version_check = skip;
        self
    }

    pub fn log_rotate(mut self, retained: u32) -> Self {
        self.settings.log_rotate = retained;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Assemble the runtime. Nothing binds or loads until `start`.
    pub fn build(self) -> Hearth {
        Hearth::from_settings(self.settings)
    }
}
