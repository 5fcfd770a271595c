use std::sync::Arc;

use axum::{
    Router,
    body::Body as AxumBody,
    extract::{Request, State},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio_util::sync::CancellationToken;

use crate::{
    adapters::middleware::{
        ApiKeyAuth, request_id_middleware, request_timing_middleware, require_api_key,
    },
    config::ForwardingConfig,
    core::{Dispatcher, ForwardRequest, Forwarder, GatewayError, RetryPolicy, RouteTable},
    ports::http_client::HttpClient,
};

/// Request handler: dispatch, buffer the body, forward, relay.
///
/// In-flight forwards stop when `shutdown` fires.
pub struct HttpHandler {
    dispatcher: Dispatcher,
    forwarder: Forwarder,
    max_body_bytes: usize,
    shutdown: CancellationToken,
}

impl HttpHandler {
    pub fn new(
        dispatcher: Dispatcher,
        forwarder: Forwarder,
        max_body_bytes: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            forwarder,
            max_body_bytes,
            shutdown,
        }
    }

    pub fn from_config(
        routes: Arc<RouteTable>,
        http_client: Arc<dyn HttpClient>,
        config: &ForwardingConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self::new(
            Dispatcher::new(routes, config.preserve_query),
            Forwarder::new(http_client, RetryPolicy::from(config)),
            config.max_body_bytes,
            shutdown,
        )
    }

    /// Forward one inbound request.
    ///
    /// Routing errors are returned before the body is read or any downstream
    /// call is made.
    pub async fn handle_request(
        &self,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, GatewayError> {
        let (parts, body) = req.into_parts();

        let dispatch = self.dispatcher.dispatch(&parts.uri)?;
        tracing::Span::current().record("service", dispatch.service.as_str());
        tracing::debug!(
            service = %dispatch.service,
            "Resolved {} to {}",
            parts.uri.path(),
            dispatch.target
        );

        let body = Limited::new(body, self.max_body_bytes)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    GatewayError::PayloadTooLarge {
                        limit: self.max_body_bytes,
                    }
                } else {
                    GatewayError::BadRequest(format!("failed to read request body: {e}"))
                }
            })?
            .to_bytes();

        // a client disconnect drops this future, and the in-flight forward with it
        let cancel = self.shutdown.child_token();

        let forwarded = self
            .forwarder
            .forward(
                ForwardRequest {
                    method: parts.method,
                    headers: parts.headers,
                    body,
                    target: dispatch.target,
                },
                &cancel,
            )
            .await?;

        if forwarded.attempts.len() > 1 {
            tracing::info!(
                service = %dispatch.service,
                attempts = forwarded.attempts.len(),
                "Forwarded after retries"
            );
        }

        Ok(forwarded.response)
    }

    /// Like [`HttpHandler::handle_request`], with errors rendered as responses.
    pub async fn handle(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        match self.handle_request(req).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    GatewayError::DownstreamUnavailable { .. } => {
                        tracing::error!("Request handling error: {}", e)
                    }
                    _ => tracing::info!("Request rejected: {}", e),
                }
                e.into_response()
            }
        }
    }
}

async fn forward_route(State(handler): State<Arc<HttpHandler>>, req: Request) -> Response {
    handler.handle(req).await
}

/// Build the gateway router: every method and path is forwarded, behind the
/// API key check, with request logging outermost.
pub fn build_router(handler: Arc<HttpHandler>, auth: ApiKeyAuth) -> Router {
    Router::new()
        .route("/", any(forward_route))
        .route("/{*path}", any(forward_route))
        .with_state(handler)
        .layer(middleware::from_fn_with_state(auth, require_api_key))
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(request_id_middleware))
}
