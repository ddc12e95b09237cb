//! HTTP ingress for the ingestion stage.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pipeline_storage::{MessageQueue, ObjectStore};
use serde_json::{json, Map, Value};
use tower_http::cors::CorsLayer;

use crate::{event::HttpEvent, IngestionWorker};

pub fn router<S, Q>(worker: Arc<IngestionWorker<S, Q>>) -> Router
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/uploads", post(create_upload::<S, Q>))
        .layer(CorsLayer::permissive())
        .with_state(worker)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The raw body is handed to the worker untouched so malformed JSON gets the
/// same structured failure as any other bad request.
async fn create_upload<S, Q>(
    State(worker): State<Arc<IngestionWorker<S, Q>>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>)
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
{
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.to_string(), Value::String(value.to_string())))
        })
        .collect::<Map<_, _>>();

    let event = HttpEvent {
        headers: Value::Object(headers),
        body: (!body.is_empty()).then_some(Value::String(body)),
    };
    let response = worker.handle(event).await;

    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}
