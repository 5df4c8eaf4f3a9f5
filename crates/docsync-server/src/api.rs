//! HTTP API handlers.
//!
//! The save path is independent of the real-time path: nothing here touches
//! the gateway, and nothing on the socket touches the stores.

use crate::error::ApiError;
use crate::metrics;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use docsync_core::room::validate_room_name;
use docsync_store::StorageTier;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tracing::{debug, warn};

/// File served at `/editor.html`, relative to the static directory.
pub const EDITOR_FILE: &str = "editor.html";

/// Body of `POST /api/save-doc`.
#[derive(Debug, Deserialize)]
pub struct SaveDocRequest {
    pub room: Option<String>,
    pub content: Option<String>,
}

/// Response of a successful save.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocResponse {
    pub message: String,
    pub document_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Response of `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub db_state: String,
    pub timestamp: DateTime<Utc>,
}

/// Response of `GET /api/docs/{room}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub room: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
    pub tier: StorageTier,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/save-doc", post(save_doc))
        .route("/api/health", get(health))
        .route("/api/docs/:room", get(get_doc))
        .route("/test", get(test))
        .route("/editor.html", get(editor))
}

fn save_message(tier: StorageTier) -> &'static str {
    match tier {
        StorageTier::Durable => "Document saved to database",
        StorageTier::Volatile => "Document saved to memory (database not available)",
    }
}

/// Save the latest content of a room.
async fn save_doc(
    State(state): State<AppState>,
    payload: Result<Json<SaveDocRequest>, JsonRejection>,
) -> Result<Json<SaveDocResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let room = request
        .room
        .ok_or_else(|| ApiError::bad_request("room is required"))?;
    validate_room_name(&room).map_err(ApiError::bad_request)?;
    let content = request
        .content
        .ok_or_else(|| ApiError::bad_request("content is required"))?;

    let receipt = match state.coordinator.save(&room, &content).await {
        Ok(receipt) => receipt,
        Err(e) => {
            metrics::record_save_failure();
            return Err(e.into());
        }
    };

    metrics::record_save(receipt.tier);
    metrics::set_store_connected(state.coordinator.health() == StorageTier::Durable);
    debug!(room = %room, tier = %receipt.tier, id = %receipt.document_id, "Document saved");

    Ok(Json(SaveDocResponse {
        message: save_message(receipt.tier).to_string(),
        document_id: receipt.document_id,
        timestamp: receipt.updated_at,
    }))
}

/// Report whether saves currently reach the durable store.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let tier = state.coordinator.health();
    metrics::set_store_connected(tier == StorageTier::Durable);

    Json(HealthResponse {
        status: "ok".to_string(),
        db_state: match tier {
            StorageTier::Durable => "connected",
            StorageTier::Volatile => "memory",
        }
        .to_string(),
        timestamp: Utc::now(),
    })
}

/// Read back the latest saved content of a room.
async fn get_doc(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let loaded = state
        .coordinator
        .load(&room)
        .await
        .map_err(|e| ApiError::unavailable("Document could not be loaded", e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("No document saved for room {room}")))?;

    Ok(Json(DocumentResponse {
        room: loaded.document.room_id,
        content: loaded.document.content,
        updated_at: loaded.document.updated_at,
        tier: loaded.tier,
    }))
}

async fn test() -> &'static str {
    "Server is working"
}

/// Serve the editor page if it is present in the static directory.
///
/// The file is sent as stored; a missing file is a 404 and any other read
/// failure is a 500.
async fn editor(State(state): State<AppState>) -> Response {
    let path = state.config.static_files.directory.join(EDITOR_FILE);

    match tokio::fs::read(&path).await {
        Ok(contents) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            contents,
        )
            .into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "Editor file not found");
            (StatusCode::NOT_FOUND, "Editor file not found").into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read editor file");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error loading editor").into_response()
        }
    }
}
