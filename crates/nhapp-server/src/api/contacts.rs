use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use nhapp_store::{AddContactOutcome, ContactEntry, DeviceContact, SyncReport};

use super::{AppState, Rpc};
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addContact", post(add_contact))
        .route("/removeContact", post(remove_contact))
        .route("/listContacts", post(list_contacts))
        .route("/syncContacts", post(sync_contacts))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddContact {
    owner_id: String,
    contact_email: String,
    nickname: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveContact {
    owner_id: String,
    contact_email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByOwner {
    owner_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncContacts {
    owner_id: String,
    contacts: Vec<DeviceContact>,
}

async fn add_contact(
    State(state): State<AppState>,
    Rpc(req): Rpc<AddContact>,
) -> Result<Json<AddContactOutcome>, ServerError> {
    let outcome = state.db.call(|db| {
        db.add_contact(&req.owner_id, &req.contact_email, req.nickname.as_deref())
    })?;
    Ok(Json(outcome))
}

async fn remove_contact(
    State(state): State<AppState>,
    Rpc(req): Rpc<RemoveContact>,
) -> Result<Json<Value>, ServerError> {
    let removed = state
        .db
        .call(|db| db.remove_contact(&req.owner_id, &req.contact_email))?;
    Ok(Json(json!({ "removed": removed })))
}

async fn list_contacts(
    State(state): State<AppState>,
    Rpc(req): Rpc<ByOwner>,
) -> Result<Json<Vec<ContactEntry>>, ServerError> {
    Ok(Json(state.db.call(|db| db.list_contacts(&req.owner_id))?))
}

async fn sync_contacts(
    State(state): State<AppState>,
    Rpc(req): Rpc<SyncContacts>,
) -> Result<Json<SyncReport>, ServerError> {
    let report = state
        .db
        .call(|db| db.sync_contacts(&req.owner_id, &req.contacts))?;
    Ok(Json(report))
}
