//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development. Without `RESEND_API_KEY` emails are
//! written to the log instead of being sent.

use std::net::SocketAddr;
use std::path::PathBuf;

use nhapp_shared::constants::{DEFAULT_HTTP_PORT, MAX_BLOB_SIZE};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./nhapp.db`
    pub database_path: PathBuf,

    /// Directory where uploaded media is stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./blobs`
    pub blob_storage_path: PathBuf,

    /// Maximum upload size in bytes.
    /// Env: `MAX_BLOB_SIZE`
    pub max_blob_size: usize,

    /// Externally reachable base URL of this server, used for upload URLs
    /// and to resolve stored media handles.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// API key for the Resend email service.
    /// Env: `RESEND_API_KEY`
    /// Default: none (dev mode).
    pub resend_api_key: Option<String>,

    /// Sender address for outgoing email.
    /// Env: `EMAIL_FROM`
    pub email_from: String,

    /// Prefix of invite deep links; the code is appended as a path segment.
    /// Env: `INVITE_BASE_URL`
    pub invite_base_url: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("blob_storage_path", &self.blob_storage_path)
            .field("max_blob_size", &self.max_blob_size)
            .field("public_base_url", &self.public_base_url)
            .field("resend_api_key", &self.resend_api_key.as_ref().map(|_| "<redacted>"))
            .field("email_from", &self.email_from)
            .field("invite_base_url", &self.invite_base_url)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./nhapp.db"),
            blob_storage_path: PathBuf::from("./blobs"),
            max_blob_size: MAX_BLOB_SIZE,
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            resend_api_key: None,
            email_from: "NHAPP <noreply@nhapp.com>".to_string(),
            invite_base_url: "https://nhapp.com/invite".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = non_empty(lookup("DATABASE_PATH")) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = non_empty(lookup("BLOB_STORAGE_PATH")) {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_BLOB_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_blob_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BLOB_SIZE, using default"),
            }
        }

        if let Some(url) = non_empty(lookup("PUBLIC_BASE_URL")) {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        config.resend_api_key = non_empty(lookup("RESEND_API_KEY"));

        if let Some(from) = non_empty(lookup("EMAIL_FROM")) {
            config.email_from = from;
        }

        if let Some(url) = non_empty(lookup("INVITE_BASE_URL")) {
            config.invite_base_url = url.trim_end_matches('/').to_string();
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn dev_mode(&self) -> bool {
        self.resend_api_key.is_none()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
