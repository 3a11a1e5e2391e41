use std::path::PathBuf;

/// Errors surfaced by the core registries and the dispatch path.
///
/// Registry mutations return these synchronously to the caller; dispatch
/// errors are handed to the exchange layer, which decides the wire response.
#[derive(Debug)]
pub enum CoreError {
    /// A handler declared a route flavor it does not implement the contract
    /// for (an HTTP route without the request contract, or a socket route
    /// without the socket contract).
    InvalidHandler(String),
    /// A share mount was requested for a root that is not an existing directory.
    InvalidShare(PathBuf),
    /// A route template could not be compiled into a pattern.
    InvalidPattern { template: String, reason: String },
    /// Dispatch produced no candidate endpoint and no share matched.
    NotFound,
    /// The exchange deadline elapsed before the endpoint chain completed.
    Deadline,
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::InvalidHandler(msg) => write!(f, "invalid handler: {msg}"),
            CoreError::InvalidShare(root) => {
                write!(f, "invalid share: {} is not an existing directory", root.display())
            }
            CoreError::InvalidPattern { template, reason } => {
                write!(f, "invalid pattern '{template}': {reason}")
            }
            CoreError::NotFound => write!(f, "no endpoint matched"),
            CoreError::Deadline => write!(f, "exchange deadline elapsed"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Error returned by handler entry points.
///
/// The HTTP listener maps `Status` onto the wire response; everything else
/// becomes a 500 with the message logged against the endpoint.
#[derive(Debug)]
pub enum HandlerError {
    Status(u16, String),
    Internal(String),
}

impl HandlerError {
    pub fn internal(msg: impl Into<String>) -> Self {
        HandlerError::Internal(msg.into())
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Status(code, msg) => write!(f, "handler status {code}: {msg}"),
            HandlerError::Internal(msg) => write!(f, "handler error: {msg}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Internal(err.to_string())
    }
}
