use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use nhapp_shared::media::resolve_media_url;
use nhapp_shared::types::{ChatId, MessageId, MessageKind};
use nhapp_store::{Message, NewMessage, Reaction, StarredMessage};

use super::{AppState, Rpc};
use crate::blob_store::handle_from_reference;
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sendMessage", post(send_message))
        .route("/getMessages", post(get_messages))
        .route("/markRead", post(mark_read))
        .route("/markDelivered", post(mark_delivered))
        .route("/deleteMessage", post(delete_message))
        .route("/markImageViewed", post(mark_image_viewed))
        .route("/deleteImageFile", post(delete_image_file))
        .route("/generateUploadUrl", post(generate_upload_url))
        .route("/resolveMediaUrl", post(resolve_media))
}

pub fn reaction_routes() -> Router<AppState> {
    Router::new()
        .route("/addReaction", post(add_reaction))
        .route("/removeReaction", post(remove_reaction))
        .route("/getReactions", post(get_reactions))
        .route("/starMessage", post(star_message))
        .route("/unstarMessage", post(unstar_message))
        .route("/getStarredMessages", post(get_starred_messages))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessage {
    chat_id: ChatId,
    #[serde(flatten)]
    message: NewMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByChat {
    chat_id: ChatId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkRead {
    chat_id: ChatId,
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByMessage {
    message_id: MessageId,
}

#[derive(Deserialize)]
struct ResolveMedia {
    reference: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddReaction {
    message_id: MessageId,
    emoji: String,
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveReaction {
    message_id: MessageId,
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StarMessage {
    user_id: String,
    message_id: MessageId,
    chat_id: ChatId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnstarMessage {
    user_id: String,
    message_id: MessageId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUser {
    user_id: String,
}

async fn send_message(
    State(state): State<AppState>,
    Rpc(req): Rpc<SendMessage>,
) -> Result<Json<MessageId>, ServerError> {
    let id = state
        .db
        .call(|db| db.send_message(req.chat_id, req.message))?;
    Ok(Json(id))
}

async fn get_messages(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Vec<Message>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_messages(req.chat_id))?))
}

async fn mark_read(
    State(state): State<AppState>,
    Rpc(req): Rpc<MarkRead>,
) -> Result<Json<Value>, ServerError> {
    let updated = state.db.call(|db| db.mark_read(req.chat_id, &req.user_id))?;
    Ok(Json(json!({ "updated": updated })))
}

async fn mark_delivered(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByChat>,
) -> Result<Json<Value>, ServerError> {
    let updated = state.db.call(|db| db.mark_delivered(req.chat_id))?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_message(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByMessage>,
) -> Result<Json<Value>, ServerError> {
    let deleted = state.db.call(|db| db.delete_message(req.message_id))?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn mark_image_viewed(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByMessage>,
) -> Result<Json<Value>, ServerError> {
    let updated = state.db.call(|db| db.mark_image_viewed(req.message_id))?;
    Ok(Json(json!({ "updated": updated })))
}

/// Remove a view-once image: the stored file first, then the message.
/// A file that cannot be removed is logged and does not block the delete.
async fn delete_image_file(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByMessage>,
) -> Result<Json<Value>, ServerError> {
    let message = state.db.call(|db| db.get_message(req.message_id))?;
    let Some(message) = message.filter(|m| m.kind == MessageKind::Image && !m.text.is_empty())
    else {
        return Ok(Json(json!({ "deleted": false })));
    };

    match handle_from_reference(&message.text) {
        Some(handle) => {
            if let Err(e) = state.blob_store.delete_blob(handle).await {
                tracing::warn!(message_id = %message.id, error = %e, "image file delete failed");
            }
        }
        None => tracing::warn!(message_id = %message.id, "image reference is not a stored file"),
    }

    let deleted = state.db.call(|db| db.delete_message(message.id))?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn generate_upload_url(State(state): State<AppState>) -> Json<String> {
    Json(format!("{}/blob/upload", state.config.public_base_url))
}

async fn resolve_media(
    State(state): State<AppState>,
    Rpc(req): Rpc<ResolveMedia>,
) -> Json<Value> {
    let url = resolve_media_url(&req.reference, &state.config.public_base_url);
    Json(json!({ "url": url }))
}

async fn add_reaction(
    State(state): State<AppState>,
    Rpc(req): Rpc<AddReaction>,
) -> Result<Json<Value>, ServerError> {
    let added = state
        .db
        .call(|db| db.add_reaction(req.message_id, &req.emoji, &req.user_id))?;
    Ok(Json(json!({ "added": added })))
}

async fn remove_reaction(
    State(state): State<AppState>,
    Rpc(req): Rpc<RemoveReaction>,
) -> Result<Json<Value>, ServerError> {
    let removed = state
        .db
        .call(|db| db.remove_reaction(req.message_id, &req.user_id))?;
    Ok(Json(json!({ "removed": removed })))
}

async fn get_reactions(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByMessage>,
) -> Result<Json<Vec<Reaction>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_reactions(req.message_id))?))
}

async fn star_message(
    State(state): State<AppState>,
    Rpc(req): Rpc<StarMessage>,
) -> Result<Json<Value>, ServerError> {
    let starred = state
        .db
        .call(|db| db.star_message(&req.user_id, req.message_id, req.chat_id))?;
    Ok(Json(json!({ "starred": starred })))
}

async fn unstar_message(
    State(state): State<AppState>,
    Rpc(req): Rpc<UnstarMessage>,
) -> Result<Json<Value>, ServerError> {
    let removed = state
        .db
        .call(|db| db.unstar_message(&req.user_id, req.message_id))?;
    Ok(Json(json!({ "removed": removed })))
}

async fn get_starred_messages(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUser>,
) -> Result<Json<Vec<StarredMessage>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_starred_messages(&req.user_id))?))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};

    use crate::api::test_support::TestApp;

    async fn chat_between_two(app: &TestApp) -> (String, String, Value) {
        let a = app
            .ok("users/createOrGetUser", json!({ "email": "a@example.com", "name": "A" }))
            .await["userId"]
            .as_str()
            .unwrap()
            .to_string();
        let b = app
            .ok("users/createOrGetUser", json!({ "email": "b@example.com", "name": "B" }))
            .await["userId"]
            .as_str()
            .unwrap()
            .to_string();
        let chat = app
            .ok(
                "chats/createPrivateChat",
                json!({ "participants": [a, b], "currentUserId": a }),
            )
            .await;
        (a, b, chat)
    }

    #[tokio::test]
    async fn view_once_image_lifecycle() {
        let app = TestApp::new().await;
        let (a, b, chat) = chat_between_two(&app).await;

        let upload_url = app.ok("messages/generateUploadUrl", json!({})).await;
        assert_eq!(upload_url, "http://localhost:8080/blob/upload");

        let (status, body) = app
            .send(
                Request::post("/blob/upload")
                    .header("content-type", "image/jpeg")
                    .body(Body::from(vec![0xffu8, 0xd8, 0xff]))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let storage_id = serde_json::from_slice::<Value>(&body).unwrap()["storageId"].clone();

        let message_id = app
            .ok(
                "messages/sendMessage",
                json!({ "chatId": chat, "senderId": a, "text": storage_id, "type": "image" }),
            )
            .await;

        app.ok("messages/markDelivered", json!({ "chatId": chat })).await;
        app.ok("messages/markRead", json!({ "chatId": chat, "userId": b })).await;
        let viewed = app
            .ok("messages/markImageViewed", json!({ "messageId": message_id }))
            .await;
        assert_eq!(viewed["updated"], true);

        // viewed is terminal
        let again = app
            .ok("messages/markRead", json!({ "chatId": chat, "userId": b }))
            .await;
        assert_eq!(again["updated"], 0);
        let messages = app.ok("messages/getMessages", json!({ "chatId": chat })).await;
        assert_eq!(messages[0]["status"], "viewed");

        let deleted = app
            .ok("messages/deleteImageFile", json!({ "messageId": message_id }))
            .await;
        assert_eq!(deleted["deleted"], true);

        let (status, _) = app
            .send(
                Request::get(format!("/blob/{}", storage_id.as_str().unwrap()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let messages = app.ok("messages/getMessages", json!({ "chatId": chat })).await;
        assert!(messages.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_image_file_ignores_text_messages() {
        let app = TestApp::new().await;
        let (a, _, chat) = chat_between_two(&app).await;
        let message_id = app
            .ok("messages/sendMessage", json!({ "chatId": chat, "senderId": a, "text": "plain" }))
            .await;

        let deleted = app
            .ok("messages/deleteImageFile", json!({ "messageId": message_id }))
            .await;
        assert_eq!(deleted["deleted"], false);
        let messages = app.ok("messages/getMessages", json!({ "chatId": chat })).await;
        assert_eq!(messages.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_to_missing_chat_is_not_found() {
        let app = TestApp::new().await;
        let (status, body) = app
            .rpc(
                "messages/sendMessage",
                json!({ "chatId": uuid::Uuid::new_v4(), "senderId": "x", "text": "hello?" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "NotFound");
    }

    #[tokio::test]
    async fn reactions_and_stars() {
        let app = TestApp::new().await;
        let (a, b, chat) = chat_between_two(&app).await;
        let message_id = app
            .ok("messages/sendMessage", json!({ "chatId": chat, "senderId": a, "text": "star me" }))
            .await;

        app.ok(
            "reactions/addReaction",
            json!({ "messageId": message_id, "emoji": "👍", "userId": b }),
        )
        .await;
        app.ok(
            "reactions/addReaction",
            json!({ "messageId": message_id, "emoji": "❤️", "userId": b }),
        )
        .await;
        let reactions = app
            .ok("reactions/getReactions", json!({ "messageId": message_id }))
            .await;
        assert_eq!(reactions, json!([{ "emoji": "❤️", "userId": b }]));

        app.ok(
            "reactions/removeReaction",
            json!({ "messageId": message_id, "userId": b }),
        )
        .await;

        app.ok(
            "reactions/starMessage",
            json!({ "userId": b, "messageId": message_id, "chatId": chat }),
        )
        .await;
        let starred = app
            .ok("reactions/getStarredMessages", json!({ "userId": b }))
            .await;
        assert_eq!(starred[0]["text"], "star me");
        assert!(starred[0]["starredAt"].is_i64());

        let unstarred = app
            .ok("reactions/unstarMessage", json!({ "userId": b, "messageId": message_id }))
            .await;
        assert_eq!(unstarred["removed"], true);
    }

    #[tokio::test]
    async fn media_references_resolve_against_public_url() {
        let app = TestApp::new().await;
        let resolved = app
            .ok("messages/resolveMediaUrl", json!({ "reference": "abc" }))
            .await;
        assert_eq!(resolved["url"], "http://localhost:8080/blob/abc");
        let passthrough = app
            .ok("messages/resolveMediaUrl", json!({ "reference": "https://x.test/a.png" }))
            .await;
        assert_eq!(passthrough["url"], "https://x.test/a.png");
    }
}
