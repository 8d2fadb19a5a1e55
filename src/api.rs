//! HTTP transport for the command surface.
//!
//! Reply-bearing commands call the service directly; `POST /process/{id}` is
//! fire-and-forget and only publishes the id on the bus.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;

use crate::bus::MessageBus;
use crate::error::ServiceError;
use crate::ingest::parse_id;
use crate::rank::TopPosts;
use crate::service::{Endpoint, HnService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<HnService>,
    pub bus: Arc<dyn MessageBus>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/fetch", post(fetch_ids))
        .route("/ids", get(list_ids))
        .route("/process/{id}", post(process_id))
        .route("/process/{id}/reply", post(process_id_reply))
        .route("/sort", post(sort))
        .route("/top/{count}", get(top))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `GET /metrics` in Prometheus text format, merged in when `[http] metrics` is on.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

#[derive(serde::Serialize)]
struct ErrorBody {
    code: u16,
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: self.code(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn json_bytes(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn fetch_ids(State(state): State<AppState>) -> Result<String, ServiceError> {
    state.service.fetch_ids().await
}

async fn list_ids(State(state): State<AppState>) -> Result<Response, ServiceError> {
    state.service.list_ids().await.map(json_bytes)
}

async fn process_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let id = parse_id(id.as_bytes())?;
    if let Err(e) = state
        .bus
        .publish(Endpoint::ProcessId.subject(), Bytes::from(id.to_string()))
        .await
    {
        tracing::warn!(target: "api", id, error = %e, "failed to publish process request");
    }
    Ok(StatusCode::ACCEPTED)
}

async fn process_id_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state
        .service
        .process_id_reply(id.as_bytes())
        .await
        .map(json_bytes)
}

async fn sort(State(state): State<AppState>) -> Result<String, ServiceError> {
    state.service.sort().await
}

async fn top(
    State(state): State<AppState>,
    Path(count): Path<String>,
) -> Result<Json<TopPosts>, ServiceError> {
    state.service.top(count.as_bytes()).await.map(Json)
}
