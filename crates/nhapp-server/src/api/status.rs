use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use nhapp_shared::types::{StatusId, StatusKind};
use nhapp_store::{StatusFeed, StatusViewer};

use super::{AppState, Rpc};
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/createStatus", post(create_status))
        .route("/listActiveStatuses", post(list_active_statuses))
        .route("/deleteStatus", post(delete_status))
        .route("/markStatusViewed", post(mark_status_viewed))
        .route("/getStatusViewers", post(get_status_viewers))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateStatus {
    user_id: String,
    #[serde(rename = "type")]
    kind: StatusKind,
    file_id: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUser {
    current_user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByStatus {
    status_id: StatusId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkViewed {
    status_id: StatusId,
    viewer_id: String,
}

async fn create_status(
    State(state): State<AppState>,
    Rpc(req): Rpc<CreateStatus>,
) -> Result<Json<StatusId>, ServerError> {
    let id = state.db.call(|db| {
        db.create_status(&req.user_id, req.kind, req.file_id.as_deref(), req.text.as_deref())
    })?;
    Ok(Json(id))
}

async fn list_active_statuses(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUser>,
) -> Result<Json<StatusFeed>, ServerError> {
    Ok(Json(state.db.call(|db| db.list_active_statuses(&req.current_user_id))?))
}

async fn delete_status(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByStatus>,
) -> Result<Json<Value>, ServerError> {
    let deleted = state.db.call(|db| db.delete_status(req.status_id))?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn mark_status_viewed(
    State(state): State<AppState>,
    Rpc(req): Rpc<MarkViewed>,
) -> Result<Json<Value>, ServerError> {
    let recorded = state
        .db
        .call(|db| db.mark_status_viewed(req.status_id, &req.viewer_id))?;
    Ok(Json(json!({ "recorded": recorded })))
}

async fn get_status_viewers(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByStatus>,
) -> Result<Json<Vec<StatusViewer>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_status_viewers(req.status_id))?))
}
