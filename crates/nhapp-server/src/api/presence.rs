use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use nhapp_shared::types::ChatId;
use nhapp_store::{OnlineMap, OnlineStatus, TypingStatus};

use super::{AppState, Rpc};
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/updatePresence", post(update_presence))
        .route("/getOnlineStatus", post(get_online_status))
        .route("/getUserOnlineStatus", post(get_user_online_status))
}

pub fn typing_routes() -> Router<AppState> {
    Router::new()
        .route("/setTyping", post(set_typing))
        .route("/getTypingStatus", post(get_typing_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePresence {
    user_id: String,
    is_online: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUsers {
    user_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUser {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTyping {
    chat_id: ChatId,
    user_id: String,
    is_typing: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByChat {
    chat_id: ChatId,
}

async fn update_presence(
    State(state): State<AppState>,
    Rpc(req): Rpc<UpdatePresence>,
) -> Result<Json<Value>, ServerError> {
    let updated = state
        .db
        .call(|db| db.update_presence(&req.user_id, req.is_online))?;
    Ok(Json(json!({ "updated": updated })))
}

async fn get_online_status(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUsers>,
) -> Result<Json<OnlineMap>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_online_status(&req.user_ids))?))
}

async fn get_user_online_status(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUser>,
) -> Result<Json<OnlineStatus>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_user_online_status(&req.user_id))?))
}

async fn set_typing(
    State(state): State<AppState>,
    Rpc(req): Rpc<SetTyping>,
) -> Result<Json<Value>, ServerError> {
    state
        .db
        .call(|db| db.set_typing(req.chat_id, &req.user_id, req.is_typing))?;
    Ok(Json(json!({ "success": true })))
}

async fn get_typing_status(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Vec<TypingStatus>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_typing_status(req.chat_id))?))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use crate::api::test_support::TestApp;

    #[tokio::test]
    async fn presence_round_trip() {
        let app = TestApp::new().await;
        let user = app
            .ok("users/createOrGetUser", json!({ "email": "p@example.com", "name": "P" }))
            .await["userId"]
            .clone();

        app.ok("presence/updatePresence", json!({ "userId": user, "isOnline": false }))
            .await;
        let status = app
            .ok("presence/getUserOnlineStatus", json!({ "userId": user }))
            .await;
        assert_eq!(status["isOnline"], false);
        assert!(status["lastSeen"].is_i64());

        let map = app
            .ok("presence/getOnlineStatus", json!({ "userIds": [user, "ghost"] }))
            .await;
        assert_eq!(map[user.as_str().unwrap()], false);
        assert_eq!(map["ghost"], false);
    }

    #[tokio::test]
    async fn typing_indicator_fades() {
        let app = TestApp::new().await;
        let a = app
            .ok("users/createOrGetUser", json!({ "email": "t1@example.com", "name": "T1" }))
            .await["userId"]
            .clone();
        let b = app
            .ok("users/createOrGetUser", json!({ "email": "t2@example.com", "name": "T2" }))
            .await["userId"]
            .clone();
        let chat = app
            .ok("chats/createPrivateChat", json!({ "participants": [a, b], "currentUserId": a }))
            .await;

        app.ok("typing/setTyping", json!({ "chatId": chat, "userId": a, "isTyping": true }))
            .await;
        let typing = app.ok("typing/getTypingStatus", json!({ "chatId": chat })).await;
        assert_eq!(typing[0]["userId"], a);

        app.clock.advance(Duration::seconds(6));
        let typing = app.ok("typing/getTypingStatus", json!({ "chatId": chat })).await;
        assert!(typing.as_array().unwrap().is_empty());
    }
}
