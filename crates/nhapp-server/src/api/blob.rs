use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(blob_upload))
        .route("/:id", get(blob_download).delete(blob_delete))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlobUploadResponse {
    storage_id: Uuid,
}

/// Accepts either a raw body or a multipart form with a `file` field.
async fn blob_upload(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<BlobUploadResponse>, ServerError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let data = if is_multipart {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ServerError::Validation(format!("Multipart error: {}", e.body_text())))?;
        read_file_field(multipart).await?
    } else {
        Bytes::from_request(req, &state)
            .await
            .map_err(|e| ServerError::Validation(e.body_text()))?
    };

    let id = state.blob_store.store_blob(&data).await?;
    info!(id = %id, size = data.len(), "Blob uploaded via API");

    Ok(Json(BlobUploadResponse { storage_id: id }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<Bytes, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::Validation(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            return field
                .bytes()
                .await
                .map_err(|e| ServerError::Validation(format!("Failed to read field: {}", e)));
        }
    }

    Err(ServerError::Validation(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn blob_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Vec<u8>, ServerError> {
    state.blob_store.get_blob(id).await
}

async fn blob_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ServerError> {
    state.blob_store.delete_blob(id).await?;
    Ok(Json(json!({ "deleted": true })))
}
