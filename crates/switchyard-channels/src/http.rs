//! HTTP channel: `POST /dispatch` in, JSON `POST` out.

use crate::error::ChannelError;
use crate::{DeliveryChannel, MessageHandler};
use async_trait::async_trait;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{DispatchContext, DispatchResult, Instruction, Message, Target};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Largest accepted request body (25 MiB).
pub const MAX_REQUEST_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Largest error body kept from a rejected delivery.
const MAX_DELIVERY_ERROR_BODY_BYTES: usize = 1024;

/// Sender identifier for raw-audio uploads.
pub const SOURCE_HEADER: &str = "x-switchyard-source";

/// JSON-encoded [`Instruction`] for raw-audio uploads.
pub const INSTRUCTION_HEADER: &str = "x-switchyard-instruction";

fn default_enabled() -> bool {
    true
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpChannelConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for one dispatch, from request to response.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpChannelConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HttpChannelConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Shared state for the HTTP handlers.
struct HttpState {
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
    request_timeout: Duration,
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn websocket_handler() -> ApiError {
    ApiError::NotImplemented("websocket not yet implemented".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl axum::http::header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Builds a [`Message`] from a JSON body, or from raw audio plus headers.
fn decode_message(headers: &HeaderMap, body: Bytes) -> Result<Message, ApiError> {
    let content_type = header_str(headers, header::CONTENT_TYPE);

    if content_type.is_some_and(is_json) {
        return serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid json: {}", e)));
    }

    let instruction = match header_str(headers, INSTRUCTION_HEADER) {
        Some(raw) => serde_json::from_str::<Instruction>(raw)
            .map_err(|e| ApiError::BadRequest(format!("invalid instruction header: {}", e)))?,
        None => Instruction::default(),
    };
    let source = header_str(headers, SOURCE_HEADER).unwrap_or_default();

    let mut message = Message::from_audio(source, body.to_vec(), "", instruction);
    message.content_type = content_type.map(str::to_string);
    Ok(message)
}

/// Handler for `POST /dispatch`.
async fn dispatch_handler(
    Extension(state): Extension<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DispatchResult>, ApiError> {
    let message = decode_message(&headers, body)?;
    tracing::debug!(
        message_id = %message.id,
        source = %message.source,
        audio_bytes = message.audio.len(),
        "http dispatch request"
    );

    let ctx = DispatchContext::with_cancellation(state.shutdown.child_token())
        .with_timeout(state.request_timeout);
    let result = state.handler.handle(message, ctx).await;
    Ok(Json(result))
}

/// Builds the inbound router. Each request dispatches under a child of
/// `shutdown`, bounded by `request_timeout`.
pub fn router(
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
    request_timeout: Duration,
) -> Router {
    let state = Arc::new(HttpState {
        handler,
        shutdown,
        request_timeout,
    });

    Router::new()
        .route("/health", get(health))
        .route(
            "/dispatch",
            post(dispatch_handler).layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES)),
        )
        .route("/ws", get(websocket_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// HTTP delivery channel.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    config: HttpChannelConfig,
    client: reqwest::Client,
    closed: CancellationToken,
}

impl HttpChannel {
    pub fn new(config: HttpChannelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            closed: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &HttpChannelConfig {
        &self.config
    }

    /// Serves the router on an already-bound listener until `shutdown` is
    /// cancelled or the channel is closed.
    pub async fn serve(
        &self,
        listener: TcpListener,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ChannelError> {
        let request_timeout = Duration::from_secs(self.config.request_timeout_secs);
        let app = router(handler, shutdown.clone(), request_timeout);
        let closed = self.closed.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    () = closed.cancelled() => {}
                }
                tracing::info!("http channel shutting down");
            })
            .await
            .map_err(ChannelError::Serve)
    }
}

#[async_trait]
impl DeliveryChannel for HttpChannel {
    fn name(&self) -> &str {
        "http"
    }

    async fn listen(
        &self,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), ChannelError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ChannelError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(%addr, "http channel listening");
        self.serve(listener, handler, shutdown).await
    }

    async fn send(&self, target: &Target, payload: &[u8]) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&target.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|source| ChannelError::Request {
                endpoint: target.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let mut end = body.len().min(MAX_DELIVERY_ERROR_BODY_BYTES);
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            return Err(ChannelError::Status {
                endpoint: target.endpoint.clone(),
                status: status.as_u16(),
                body: body[..end].to_string(),
            });
        }

        tracing::debug!(
            target = %target.service_name,
            endpoint = %target.endpoint,
            status = status.as_u16(),
            "http delivery succeeded"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.closed.cancel();
        Ok(())
    }
}
