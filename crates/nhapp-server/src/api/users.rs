use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use nhapp_store::{ProfileUpdate, User};

use super::{AppState, Rpc};
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/createOrGetUser", post(create_or_get_user))
        .route("/getUserByEmail", post(get_user_by_email))
        .route("/getUserById", post(get_user_by_id))
        .route("/searchUsers", post(search_users))
        .route("/updateProfile", post(update_profile))
        .route("/deleteAccount", post(delete_account))
}

#[derive(Deserialize)]
struct CreateOrGetUser {
    email: String,
    name: String,
}

#[derive(Deserialize)]
struct ByEmail {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByUserId {
    user_id: String,
}

/// The fragment travels as `email`; `searchTerm` and `query` are accepted
/// as alternate names.
#[derive(Deserialize)]
struct Search {
    #[serde(alias = "searchTerm", alias = "query")]
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfile {
    user_id: String,
    #[serde(flatten)]
    update: ProfileUpdate,
}

async fn create_or_get_user(
    State(state): State<AppState>,
    Rpc(req): Rpc<CreateOrGetUser>,
) -> Result<Json<User>, ServerError> {
    let user = state
        .db
        .call(|db| db.create_or_get_user(&req.email, &req.name))?;
    Ok(Json(user))
}

async fn get_user_by_email(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByEmail>,
) -> Result<Json<Option<User>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_user_by_email(&req.email))?))
}

async fn get_user_by_id(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUserId>,
) -> Result<Json<Option<User>>, ServerError> {
    Ok(Json(state.db.call(|db| db.get_user_by_id(&req.user_id))?))
}

async fn search_users(
    State(state): State<AppState>,
    Rpc(req): Rpc<Search>,
) -> Result<Json<Vec<User>>, ServerError> {
    Ok(Json(state.db.call(|db| db.search_users(&req.email))?))
}

async fn update_profile(
    State(state): State<AppState>,
    Rpc(req): Rpc<UpdateProfile>,
) -> Result<Json<User>, ServerError> {
    let user = state
        .db
        .call(|db| db.update_profile(&req.user_id, &req.update))?;
    Ok(Json(user))
}

async fn delete_account(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByUserId>,
) -> Result<Json<Value>, ServerError> {
    state.db.call(|db| db.delete_account(&req.user_id))?;
    Ok(Json(json!({ "success": true })))
}
