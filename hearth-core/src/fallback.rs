//! The built-in default route.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::exchange::HttpExchange;
use crate::handler::{EndpointCall, Handler, RequestHandler, RouteSpec};

const MARKER_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Hearth</title></head>\n\
<body>\n<h1>Hearth is running</h1>\n<p>No routes are registered yet.</p>\n</body>\n</html>\n";

/// Serves a marker page while nothing else is registered. Installed and
/// evicted by the route registry; never registered by user code.
pub struct DefaultRouteHandler;

impl Handler for DefaultRouteHandler {
    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::http("/", "default")]
    }

    fn as_request_handler(self: Arc<Self>) -> Option<Arc<dyn RequestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RequestHandler for DefaultRouteHandler {
    async fn handle_http(
        &self,
        exchange: &mut HttpExchange,
        _call: &EndpointCall,
    ) -> Result<(), HandlerError> {
        exchange.set_header("content-type", "text/html; charset=utf-8")?;
        exchange.set_header("x-hearth-default", "true")?;
        exchange.print(MARKER_PAGE);
        Ok(())
    }
}
