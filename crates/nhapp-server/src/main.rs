//! # nhapp-server
//!
//! HTTP backend for the NHAPP messenger.
//!
//! This binary provides:
//! - **RPC API** (axum) exposing every directory, contact, chat, message,
//!   presence, typing and status operation as `POST /rpc/<module>/<op>`
//! - **Passcode sign-in and invites**, delivered by email through Resend
//!   (or written to the log in dev mode)
//! - **Media storage** for images and voice notes under `/blob`
//! - **Per-IP rate limiting** and a per-email passcode throttle
//! - **Background purges** of expired statuses, passcodes, invites and
//!   stale typing rows

mod api;
mod auth;
mod blob_store;
mod config;
mod db;
mod email;
mod error;
mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use nhapp_store::Database;

use crate::api::AppState;
use crate::auth::AuthGateway;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::db::SharedDb;
use crate::email::EmailClient;
use crate::rate_limit::{otp_throttle, RateLimiter};

/// Typing rows untouched for this many minutes are deleted outright.
const TYPING_RETENTION_MINUTES: i64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,nhapp_server=debug,nhapp_store=debug")),
        )
        .init();

    info!("Starting NHAPP server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.dev_mode() {
        info!("RESEND_API_KEY not set, emails will be logged instead of sent");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = SharedDb::new(Database::open_at(&config.database_path)?);

    let blob_store = Arc::new(
        BlobStore::new(config.blob_storage_path.clone(), config.max_blob_size).await?,
    );

    let email = EmailClient::new(config.resend_api_key.clone(), config.email_from.clone());
    let auth = AuthGateway::new(
        db.clone(),
        email,
        otp_throttle(),
        config.invite_base_url.clone(),
    );

    // Rate limiter: 10 req/s sustained, burst of 30
    let rate_limiter = RateLimiter::default();

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: db.clone(),
        auth: auth.clone(),
        blob_store,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter buckets (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    let throttle = auth.throttle().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(Duration::from_secs(600)).await;
            throttle.purge_stale(Duration::from_secs(600)).await;
        }
    });

    // Expired statuses, passcodes, invites and stale typing rows (every minute)
    let purge_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let result = purge_db.call(|db| {
                let now = db.now();
                let statuses = db.purge_expired_statuses()?;
                let (otps, invites) = db.purge_expired_auth(now)?;
                let typing = db
                    .purge_stale_typing(now - chrono::Duration::minutes(TYPING_RETENTION_MINUTES))?;
                Ok::<_, nhapp_store::StoreError>((statuses, otps, invites, typing))
            });
            match result {
                Ok((statuses, otps, invites, typing)) => {
                    tracing::debug!(statuses, otps, invites, typing, "purge pass complete")
                }
                Err(e) => tracing::error!(error = %e, "purge pass failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
