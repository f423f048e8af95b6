//! # nhapp-store
//!
//! Durable document store for the NHAPP messaging backend, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection`. Every query and mutation the client surface
//! offers (users, contacts, chats, messages, reactions, presence, typing,
//! status posts, passcodes and invites) is a typed method on `Database`,
//! grouped by entity in the modules below.

pub mod chats;
pub mod contacts;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod otp;
pub mod presence;
pub mod reactions;
pub mod status;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
