use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use nhapp_shared::types::ChatId;
use nhapp_store::{Chat, Database};

use super::{AppState, Rpc};
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/createPrivateChat", post(create_private_chat))
        .route("/createGroupChat", post(create_group_chat))
        .route("/getChat", post(get_chat))
        .route("/getUserChats", post(get_user_chats))
        .route("/muteChat", post(mute_chat))
        .route("/unmuteChat", post(unmute_chat))
        .route("/archiveChat", post(archive_chat))
        .route("/unarchiveChat", post(unarchive_chat))
        .route("/setWallpaper", post(set_wallpaper))
        .route("/getWallpaper", post(get_wallpaper))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePrivateChat {
    participants: Vec<String>,
    current_user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupChat {
    name: String,
    participants: Vec<String>,
    current_user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByChat {
    chat_id: ChatId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUser {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetWallpaper {
    chat_id: ChatId,
    wallpaper: Option<String>,
}

async fn create_private_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<CreatePrivateChat>,
) -> Result<Json<ChatId>, ServerError> {
    let id = state
        .db
        .call(|db| db.create_private_chat(&req.participants, &req.current_user_id))?;
    Ok(Json(id))
}

async fn create_group_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<CreateGroupChat>,
) -> Result<Json<ChatId>, ServerError> {
    let id = state.db.call(|db| {
        db.create_group_chat(&req.name, &req.participants, &req.current_user_id)
    })?;
    Ok(Json(id))
}

async fn get_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Option<Chat>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_chat(req.chat_id))?))
}

async fn get_user_chats(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUser>,
) -> Result<Json<Vec<Chat>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_user_chats(&req.user_id))?))
}

fn flag(
    state: &AppState,
    chat_id: ChatId,
    apply: fn(&Database, ChatId) -> nhapp_store::Result<()>,
) -> Result<Json<Value>, ServerError> {
    state.db.call(|db| apply(db, chat_id))?;
    Ok(Json(json!({ "success": true })))
}

async fn mute_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Value>, ServerError> {
    flag(&state, req.chat_id, Database::mute_chat)
}

async fn unmute_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Value>, ServerError> {
    flag(&state, req.chat_id, Database::unmute_chat)
}

async fn archive_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Value>, ServerError> {
    flag(&state, req.chat_id, Database::archive_chat)
}

async fn unarchive_chat(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Value>, ServerError> {
    flag(&state, req.chat_id, Database::unarchive_chat)
}

async fn set_wallpaper(
    State(state): State<AppState>,
    Rpc(req): Rpc<SetWallpaper>,
) -> Result<Json<Value>, ServerError> {
    state
        .db
        .call(|db| db.set_wallpaper(req.chat_id, req.wallpaper.as_deref()))?;
    Ok(Json(json!({ "success": true })))
}

async fn get_wallpaper(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Option<String>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_wallpaper(req.chat_id))?))
}
