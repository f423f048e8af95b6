//! Domain model structs persisted in the store.
//!
//! Every struct derives `Serialize` so it can be handed directly to the
//! client surface as JSON. Field names are camelCase and timestamps are Unix
//! milliseconds on the wire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nhapp_shared::types::{
    ChatId, ChatKind, ContactId, MessageId, MessageKind, MessageStatus, StatusId, StatusKind,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user. One per normalised email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    /// Free-text bio.
    pub status: Option<String>,
    pub is_online: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Public subset of a user embedded in contact entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub status: Option<String>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            name: u.name,
            email: u.email,
            avatar: u.avatar,
            status: u.status,
        }
    }
}

/// Partial profile patch. Empty strings are treated as "not provided".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatus {
    pub is_online: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// userId -> online flag.
pub type OnlineMap = BTreeMap<String, bool>;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A private or group conversation with its denormalised last-message cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub participants: Vec<String>,
    pub admin_ids: Vec<String>,
    pub last_message: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_message_time: Option<DateTime<Utc>>,
    /// Shared by every participant, not tracked per user.
    pub unread_count: i64,
    pub is_muted: bool,
    pub is_archived: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub user_id: String,
}

/// A single chat message. For image and audio messages `text` holds the
/// storage handle (or URL) of the media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub file_id: Option<String>,
    pub status: MessageStatus,
    pub reactions: Vec<Reaction>,
    pub reply_to: Option<MessageId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Arguments of a send.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub file_id: Option<String>,
    pub reply_to: Option<MessageId>,
}

/// A message together with the time the user starred it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StarredMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub starred_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub owner_id: String,
    pub contact_email: String,
    pub contact_user_id: Option<String>,
    pub nickname: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A contact enriched with a live lookup of the user it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactEntry {
    #[serde(flatten)]
    pub contact: Contact,
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddContactOutcome {
    pub id: ContactId,
    pub is_new: bool,
}

/// One address-book entry read from a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContact {
    pub name: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub added: usize,
    pub existing: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Typing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatus {
    pub chat_id: ChatId,
    pub user_id: String,
    pub is_typing: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Status posts
// ---------------------------------------------------------------------------

/// An ephemeral broadcast post, visible until `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub id: StatusId,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub file_id: Option<String>,
    pub text: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusAuthor {
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// All live posts of one author, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusGroup {
    pub user: StatusAuthor,
    pub statuses: Vec<StatusUpdate>,
}

impl StatusGroup {
    pub(crate) fn latest_post(&self) -> Option<DateTime<Utc>> {
        self.statuses.last().map(|s| s.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusFeed {
    pub me: Option<StatusGroup>,
    pub others: Vec<StatusGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusViewer {
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub viewed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Passcodes and invites
// ---------------------------------------------------------------------------

/// The single pending passcode for an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    pub name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRecord {
    pub code: String,
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub expires_at: DateTime<Utc>,
}

/// What a valid invite code reveals to its recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InviteInfo {
    pub from_email: String,
    pub from_name: String,
}
