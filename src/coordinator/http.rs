//! HTTP API for the coordinator
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /files` | merged listing |
//! | `GET /files/*name` | download |
//! | `PUT /files/*name?replicate=true` | upload |
//! | `DELETE /files/*name` | delete |
//! | `GET /exists/*name` | existence check |
//! | `GET /nodes` | slot status |
//! | `GET /health`, `GET /metrics` | probes |

use crate::common::tracing_middleware::request_id_middleware;
use crate::common::{Error, METRICS};
use crate::coordinator::operations::Coordinator;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared coordinator state for HTTP handlers.
#[derive(Clone)]
pub struct CoordState {
    pub coordinator: Arc<Coordinator>,
}

pub fn create_router(state: CoordState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/files", get(list_files))
        .route(
            "/files/*name",
            get(download_file).put(upload_file).delete(delete_file),
        )
        .route("/exists/*name", get(file_exists))
        .route("/nodes", get(node_status))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(e: Error) -> Response {
    (e.to_http_status(), e.to_string()).into_response()
}

async fn list_files(State(state): State<CoordState>) -> impl IntoResponse {
    let files = state.coordinator.list().await;
    Json(json!({
        "total": files.len(),
        "files": files,
    }))
}

async fn download_file(State(state): State<CoordState>, Path(name): Path<String>) -> Response {
    match state.coordinator.download(&name).await {
        Ok(Some(data)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "File not found on any node").into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    replicate: bool,
}

async fn upload_file(
    State(state): State<CoordState>,
    Path(name): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    match state
        .coordinator
        .upload(&name, body, query.replicate)
        .await
    {
        Ok(outcome) if outcome.is_success() => {
            (StatusCode::CREATED, outcome.to_string()).into_response()
        }
        Ok(outcome) => (StatusCode::SERVICE_UNAVAILABLE, outcome.to_string()).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_file(State(state): State<CoordState>, Path(name): Path<String>) -> Response {
    match state.coordinator.delete(&name).await {
        Ok(outcome) if outcome.is_success() => {
            (StatusCode::OK, outcome.to_string()).into_response()
        }
        Ok(outcome) => (StatusCode::NOT_FOUND, outcome.to_string()).into_response(),
        Err(e) => error_response(e),
    }
}

async fn file_exists(State(state): State<CoordState>, Path(name): Path<String>) -> Response {
    match state.coordinator.exists(&name).await {
        Ok(exists) => Json(json!({ "exists": exists })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn node_status(State(state): State<CoordState>) -> impl IntoResponse {
    let nodes = state.coordinator.node_status().await;
    let live = nodes.iter().filter(|n| n.live).count();
    Json(json!({
        "nodes": nodes,
        "live": live,
        "total": nodes.len(),
    }))
}

async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    let nodes = state.coordinator.node_status().await;
    Json(json!({
        "status": "healthy",
        "nodes_live": nodes.iter().filter(|n| n.live).count(),
        "nodes_total": nodes.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.to_prometheus(),
    )
}
