//! HTTP surface.
//!
//! Every client operation is a named RPC: `POST /rpc/<module>/<operation>`
//! with a flat camelCase JSON object as body and JSON as reply. Media goes
//! through the `/blob` endpoints. Errors are `{ "error", "kind" }` objects
//! (see [`ServerError`]).

mod auth;
mod blob;
mod chats;
mod contacts;
mod messages;
mod presence;
mod status;
mod users;

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequest, Request},
    http::Method,
    middleware,
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthGateway;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::db::SharedDb;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

/// Headroom on top of `max_blob_size` for multipart framing.
const UPLOAD_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub auth: AuthGateway,
    pub blob_store: Arc<BlobStore>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

/// JSON body extractor whose rejections render like every other error.
pub struct Rpc<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Rpc<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::Validation(e.body_text()))?;
        Ok(Rpc(value))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.config.max_blob_size + UPLOAD_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .nest("/rpc/users", users::routes())
        .nest("/rpc/contacts", contacts::routes())
        .nest("/rpc/chats", chats::routes())
        .nest("/rpc/messages", messages::routes())
        .nest("/rpc/reactions", messages::reaction_routes())
        .nest("/rpc/presence", presence::routes())
        .nest("/rpc/typing", presence::typing_routes())
        .nest("/rpc/status", status::routes())
        .nest("/rpc/auth", auth::routes())
        .nest("/blob", blob::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use super::test_support::TestApp;

    #[tokio::test]
    async fn health() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(Request::get("/health").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = TestApp::new().await;
        let (status, body) = app
            .rpc("chats/getChat", json!({ "chatId": "not-a-uuid" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "ValidationError");
    }

    #[tokio::test]
    async fn unknown_operation_is_404() {
        let app = TestApp::new().await;
        let (status, _) = app.rpc("chats/explode", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Two users meet, chat, react and read, end to end over HTTP.
    #[tokio::test]
    async fn private_chat_flow() {
        let app = TestApp::new().await;

        let alice = app
            .ok("users/createOrGetUser", json!({ "email": "Alice@Example.com", "name": "Alice" }))
            .await;
        let bob = app
            .ok("users/createOrGetUser", json!({ "email": "bob@example.com", "name": "Bob" }))
            .await;
        let alice_id = alice["userId"].as_str().unwrap().to_string();
        let bob_id = bob["userId"].as_str().unwrap().to_string();
        assert_eq!(alice["email"], "alice@example.com");

        let chat_id = app
            .ok(
                "chats/createPrivateChat",
                json!({ "participants": [alice_id, bob_id], "currentUserId": alice_id }),
            )
            .await;
        let again = app
            .ok(
                "chats/createPrivateChat",
                json!({ "participants": [bob_id, alice_id], "currentUserId": bob_id }),
            )
            .await;
        assert_eq!(chat_id, again);

        for text in ["hi", "how are you?"] {
            app.ok(
                "messages/sendMessage",
                json!({ "chatId": chat_id, "senderId": alice_id, "text": text }),
            )
            .await;
        }

        let chat = app.ok("chats/getChat", json!({ "chatId": chat_id })).await;
        assert_eq!(chat["name"], "Bob");
        assert_eq!(chat["lastMessage"], "how are you?");
        assert_eq!(chat["unreadCount"], 2);

        let messages = app.ok("messages/getMessages", json!({ "chatId": chat_id })).await;
        let messages = messages.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["text"], "how are you?");
        let first_id = messages[1]["id"].clone();

        app.ok(
            "reactions/addReaction",
            json!({ "messageId": first_id, "emoji": "👍", "userId": bob_id }),
        )
        .await;

        let read = app
            .ok("messages/markRead", json!({ "chatId": chat_id, "userId": bob_id }))
            .await;
        assert_eq!(read["updated"], 2);

        let chats = app.ok("chats/getUserChats", json!({ "userId": bob_id })).await;
        assert_eq!(chats[0]["unreadCount"], 0);

        let messages = app.ok("messages/getMessages", json!({ "chatId": chat_id })).await;
        assert!(messages
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["status"] == "read"));
        assert_eq!(messages[1]["reactions"][0]["emoji"], "👍");
    }
}
