use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use nhapp_store::InviteInfo;

use super::{AppState, Rpc};
use crate::auth::{Ack, VerifyOutcome};
use crate::error::ServerError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sendOTP", post(send_otp))
        .route("/verifyOTP", post(verify_otp))
        .route("/resendOTP", post(resend_otp))
        .route("/sendInvite", post(send_invite))
        .route("/getInvite", post(get_invite))
}

#[derive(Deserialize)]
struct SendOtp {
    email: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct VerifyOtp {
    email: String,
    code: String,
}

#[derive(Deserialize)]
struct ResendOtp {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendInvite {
    from_email: String,
    from_name: String,
    to_email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetInvite {
    invite_code: String,
}

async fn send_otp(
    State(state): State<AppState>,
    Rpc(req): Rpc<SendOtp>,
) -> Result<Json<Ack>, ServerError> {
    Ok(Json(state.auth.send_otp(&req.email, req.name.as_deref()).await?))
}

async fn verify_otp(
    State(state): State<AppState>,
    Rpc(req): Rpc<VerifyOtp>,
) -> Result<Json<VerifyOutcome>, ServerError> {
    Ok(Json(state.auth.verify_otp(&req.email, &req.code)?))
}

async fn resend_otp(
    State(state): State<AppState>,
    Rpc(req): Rpc<ResendOtp>,
) -> Result<Json<Ack>, ServerError> {
    Ok(Json(state.auth.resend_otp(&req.email).await?))
}

async fn send_invite(
    State(state): State<AppState>,
    Rpc(req): Rpc<SendInvite>,
) -> Result<Json<Ack>, ServerError> {
    let ack = state
        .auth
        .send_invite(&req.from_email, &req.from_name, &req.to_email)
        .await?;
    Ok(Json(ack))
}

async fn get_invite(
    State(state): State<AppState>,
    Rpc(req): Rpc<GetInvite>,
) -> Result<Json<Option<InviteInfo>>, ServerError> {
    Ok(Json(state.auth.get_invite(&req.invite_code)?))
}
