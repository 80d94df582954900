use std::any::Any;
use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as CorsAny, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::broker::{DeliveryQueue, Message, MessagePayload, Notifier};
use crate::transport::sse::text_stream;
use crate::utils::error::IngestError;

/// Shared handles passed to every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub queue: DeliveryQueue,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(queue: DeliveryQueue, poll_interval: Duration) -> Self {
        let notifier = Notifier::new(queue.clone(), poll_interval);
        Self { queue, notifier }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Accepted {
    pub success: bool,
}

/// Validates a submission and appends it to the queue.
///
/// Returns as soon as the message is queued; delivery happens later on the
/// notifier's cadence.
pub fn submit(queue: &DeliveryQueue, payload: MessagePayload) -> Result<Accepted, IngestError> {
    let message = Message::try_from(payload)?;

    info!("Received text: {}", message.text());
    if let Some(image) = message.image_url() {
        info!("With image: {}", image);
    }
    if let Some(background) = message.background_image() {
        info!("With background: {}", background);
    }

    queue.enqueue(message);
    Ok(Accepted { success: true })
}

async fn receive_text(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Accepted>, IngestError> {
    let payload: MessagePayload =
        serde_json::from_slice(&body).map_err(|e| IngestError::BadRequest(e.to_string()))?;

    Ok(Json(submit(&state.queue, payload)?))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "queued": state.queue.len(),
        "subscriber": state.notifier.is_connected(),
    }))
}

/// Turns a handler panic into the generic 500 response.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!("Error processing request: {}", detail);
    IngestError::Internal(detail).into_response()
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/receive-text", post(receive_text))
        .route("/api/text-stream", get(text_stream))
        .route("/health", get(health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(CorsAny)
                .allow_methods(CorsAny)
                .allow_headers(CorsAny),
        )
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// On shutdown the active subscription is torn down first, so an open event
/// stream does not hold the graceful shutdown open.
pub async fn start_http_server<F>(addr: String, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);

    let notifier = state.notifier.clone();
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            if notifier.disconnect() {
                info!("Closed active subscriber for shutdown");
            }
        })
        .await
}
