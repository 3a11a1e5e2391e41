//! The HTTP listener: a catch-all axum router feeding the dispatcher.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use tokio::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tracing::{debug, error};

use crate::dispatch::{Candidate, Dispatcher, HttpDispatch, Selection};
use crate::dump::ErrorDump;
use crate::error::HandlerError;
use crate::exchange::{ExchangeHead, HttpExchange};
use crate::handler::EndpointCall;
use crate::registry::ShareMount;
use crate::server::ListenerConfig;

/// Largest request body the listener will buffer.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
struct HttpContext {
    dispatcher: Dispatcher,
    timeout: Duration,
}

/// Build the catch-all router for the HTTP listener.
pub fn http_router(dispatcher: Dispatcher, config: &ListenerConfig, dump: Arc<ErrorDump>) -> Router {
    let context = HttpContext {
        dispatcher,
        timeout: config.request_timeout,
    };
    let mut router = Router::new()
        .fallback(handle_request)
        .with_state(context);
    if config.response_encoding {
        router = router.layer(CompressionLayer::new());
    }
    router.layer(CatchPanicLayer::custom(PanicDump { dump }))
}

#[derive(Clone)]
struct PanicDump {
    dump: Arc<ErrorDump>,
}

impl tower_http::catch_panic::ResponseForPanic for PanicDump {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn std::any::Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            (*s).to_string()
        } else {
            "non-string panic payload".to_string()
        };
        let id = self.dump.capture("http handler panic", &detail);
        let mut response = Response::new(Body::from(format!("internal error (dump {id})\n")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }
}

async fn handle_request(State(context): State<HttpContext>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };
    let head = ExchangeHead {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        peer,
        deadline: Some(Instant::now() + context.timeout),
    };
    match context.dispatcher.dispatch_http(&head) {
        HttpDispatch::Endpoints(selection) => invoke(selection, head, body).await,
        HttpDispatch::Share { mount, tail } => serve_share(&mount, &tail).await,
        HttpDispatch::ShareMethodRefused => {
            let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
            response
                .headers_mut()
                .insert(http::header::ALLOW, HeaderValue::from_static("GET"));
            response
        }
        HttpDispatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Run the primary endpoint, then let `Monitor` survivors observe. The whole
/// chain shares the exchange deadline; when it elapses the remaining
/// invocations are abandoned and DEADLINE is surfaced to telemetry.
async fn invoke(selection: Selection, head: ExchangeHead, body: Bytes) -> Response {
    let deadline = head.deadline.expect("http exchanges always carry a deadline");
    let path = head.path.clone();
    let mut exchange = HttpExchange::new(head, body);

    let outcome = tokio::time::timeout_at(deadline, async {
        let response = match run_endpoint(&selection.primary, &mut exchange).await {
            Ok(()) => exchange.take_response().into_axum(),
            Err(HandlerError::Status(code, message)) => {
                let status =
                    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, message).into_response()
            }
            Err(HandlerError::Internal(message)) => {
                error!(path, error = message, "endpoint failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
        // Observation only: the response has already been taken, so anything
        // the monitors write is discarded with the exchange.
        for monitor in &selection.monitors {
            if let Err(e) = run_endpoint(monitor, &mut exchange).await {
                debug!(path, error = %e, "monitor endpoint failed");
            }
        }
        response
    })
    .await;

    match outcome {
        Ok(response) => response,
        Err(_) => {
            error!(path, "DEADLINE: exchange deadline elapsed, abandoning endpoint chain");
            (StatusCode::SERVICE_UNAVAILABLE, "deadline elapsed").into_response()
        }
    }
}

async fn run_endpoint(
    candidate: &Candidate,
    exchange: &mut HttpExchange,
) -> Result<(), HandlerError> {
    let handler = candidate
        .endpoint
        .entry()
        .request()
        .ok_or_else(|| HandlerError::internal("endpoint lost its request contract"))?;
    let call = EndpointCall {
        method: candidate.endpoint.method(),
        params: candidate.params.clone(),
    };
    handler.handle_http(exchange, &call).await
}

/// Serve a file from a share mount. The tail is resolved strictly below the
/// mount root; traversal segments are refused outright.
async fn serve_share(mount: &Arc<ShareMount>, tail: &str) -> Response {
    if Path::new(tail)
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return StatusCode::NOT_FOUND.into_response();
    }
    let path = mount.root().join(tail);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            let mut response = Response::new(Body::from(bytes));
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                response.headers_mut().insert(http::header::CONTENT_TYPE, value);
            }
            response
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
