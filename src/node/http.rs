//! HTTP API for a storage node
//!
//! Storage failures never surface as server errors: a failed write answers
//! `{"stored": false}` and a failed read answers 404, so the coordinator
//! only treats a node as dead when it cannot be reached at all.

use crate::common::tracing_middleware::request_id_middleware;
use crate::common::validate_filename;
use crate::node::store::FileStore;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub stored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Clone)]
pub struct NodeState {
    pub store: Arc<FileStore>,
    pub node_id: usize,
}

pub fn create_router(state: NodeState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/files", get(list_files))
        .route(
            "/files/*name",
            get(get_file).put(put_file).delete(delete_file),
        )
        .route("/exists/*name", get(file_exists))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 400 for names the store would refuse, so they are not mistaken for
/// storage failures.
fn invalid_name(name: &str) -> Option<Response> {
    validate_filename(name).err().map(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response()
    })
}

async fn put_file(
    State(state): State<NodeState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    if let Some(rejected) = invalid_name(&name) {
        return rejected;
    }
    let stored = match state.store.put(&name, &body).await {
        Ok(()) => {
            tracing::debug!("Stored '{}' ({} bytes)", name, body.len());
            true
        }
        Err(e) => {
            tracing::warn!("Error writing '{}' to disk: {}", name, e);
            false
        }
    };
    Json(StoreResponse { stored }).into_response()
}

async fn get_file(State(state): State<NodeState>, Path(name): Path<String>) -> Response {
    if let Some(rejected) = invalid_name(&name) {
        return rejected;
    }
    match state.store.get(&name).await {
        Ok(Some(data)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response(),
        Ok(None) => {
            tracing::debug!("'{}' does not exist on this node", name);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::warn!("Could not read '{}' from disk: {}", name, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn delete_file(
    State(state): State<NodeState>,
    Path(name): Path<String>,
) -> Response {
    if let Some(rejected) = invalid_name(&name) {
        return rejected;
    }
    let deleted = match state.store.delete(&name).await {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            tracing::warn!("Could not delete '{}': {}", name, e);
            0
        }
    };
    Json(DeleteResponse { deleted }).into_response()
}

async fn list_files(State(state): State<NodeState>) -> Json<ListResponse> {
    let files = state.store.list().await.unwrap_or_else(|e| {
        tracing::warn!("Could not list files: {}", e);
        Vec::new()
    });
    Json(ListResponse { files })
}

async fn file_exists(
    State(state): State<NodeState>,
    Path(name): Path<String>,
) -> Response {
    if let Some(rejected) = invalid_name(&name) {
        return rejected;
    }
    let exists = state.store.exists(&name).await.unwrap_or_else(|e| {
        tracing::warn!("Could not check '{}': {}", name, e);
        false
    });
    Json(ExistsResponse { exists }).into_response()
}

async fn health(State(state): State<NodeState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "node_id": state.node_id,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
