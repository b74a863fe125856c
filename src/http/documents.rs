//! Document endpoints backed by the expiring cache.
//!
//! Each `PUT` wraps the body as `{ id, data, updatedAt }` and stores it for
//! the cache TTL; reads only ever see unexpired documents.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::http::server::AppState;

pub async fn list_documents(State(state): State<AppState>) -> Json<Value> {
    let documents = state.documents.get_all();
    Json(json!({
        "count": documents.len(),
        "documents": documents,
    }))
}

pub async fn get_document(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.documents.get(&id) {
        Some(document) => Json(document).into_response(),
        None => not_found(&id),
    }
}

pub async fn put_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<Value>,
) -> Json<Value> {
    let document = json!({
        "id": id,
        "data": data,
        "updatedAt": Utc::now().to_rfc3339(),
    });
    state.documents.set(id.clone(), document.clone());
    tracing::debug!(id = %id, "Document stored");
    Json(document)
}

pub async fn delete_document(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.documents.delete(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&id)
    }
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NOT_FOUND",
            "message": format!("Document {id} not found"),
        })),
    )
        .into_response()
}
