//! User directory: create-or-get by email, profile patches, search and the
//! account deletion cascade.

use rusqlite::{params, OptionalExtension};

use nhapp_shared::constants::{DEFAULT_STATUS_TEXT, USER_SEARCH_LIMIT};
use nhapp_shared::types::{is_plausible_email, normalize_email};

use crate::database::{from_millis, or_not_found, to_millis, Database};
use crate::error::{Result, StoreError};
use crate::models::{ProfileUpdate, User};

pub(crate) const USER_COLUMNS: &str =
    "user_id, email, name, avatar, status, is_online, last_seen, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Return the user registered under `email`, creating it on first sight.
    ///
    /// The lookup and the insert are two statements; the UNIQUE index on
    /// `email` turns a racing duplicate insert into an error rather than a
    /// second row.
    pub fn create_or_get_user(&self, email: &str, name: &str) -> Result<User> {
        let email = normalize_email(email);
        if !is_plausible_email(&email) {
            return Err(StoreError::invalid(format!("invalid email address: {email}")));
        }

        if let Some(existing) = self.get_user_by_email(&email)? {
            return Ok(existing);
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("name must not be empty"));
        }

        let now = self.now();
        let user = User {
            user_id: format!("{}_{}", email, now.timestamp_millis()),
            email,
            name: name.to_string(),
            avatar: None,
            status: Some(DEFAULT_STATUS_TEXT.to_string()),
            is_online: true,
            last_seen: Some(now),
            created_at: now,
        };

        self.conn().execute(
            "INSERT INTO users (user_id, email, name, avatar, status, is_online, last_seen, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.user_id,
                user.email,
                user.name,
                user.avatar,
                user.status,
                user.is_online,
                user.last_seen.map(to_millis),
                to_millis(user.created_at),
            ],
        )?;

        tracing::info!(user_id = %user.user_id, "created user");
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![normalize_email(email)],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Case-insensitive substring search over emails, capped at ten hits.
    pub fn search_users(&self, fragment: &str) -> Result<Vec<User>> {
        let needle = fragment.trim().to_lowercase();

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE instr(email, ?1) > 0
             ORDER BY created_at ASC
             LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![needle, USER_SEARCH_LIMIT as i64], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply the non-empty fields of `update` to the user's profile.
    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<User> {
        let mut user = self.require_user(user_id)?;

        let provided = |field: &Option<String>| field.as_deref().filter(|v| !v.is_empty()).map(str::to_string);

        if let Some(name) = provided(&update.name) {
            user.name = name;
        }
        if let Some(avatar) = provided(&update.avatar) {
            user.avatar = Some(avatar);
        }
        if let Some(status) = provided(&update.status) {
            user.status = Some(status);
        }

        self.conn().execute(
            "UPDATE users SET name = ?1, avatar = ?2, status = ?3 WHERE user_id = ?4",
            params![user.name, user.avatar, user.status, user.user_id],
        )?;

        tracing::debug!(user_id = %user.user_id, "profile updated");
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove a user and everything they own.
    ///
    /// Deletes every chat the user participates in (with all of its
    /// messages), the user's messages anywhere else, their status posts,
    /// their contacts, and finally the user row, inside one transaction.
    pub fn delete_account(&self, user_id: &str) -> Result<()> {
        self.require_user(user_id)?;

        let tx = self.conn().unchecked_transaction()?;

        let chats = tx.execute(
            "DELETE FROM chats
             WHERE id IN (SELECT chat_id FROM chat_participants WHERE user_id = ?1)",
            params![user_id],
        )?;
        let messages = tx.execute("DELETE FROM messages WHERE sender_id = ?1", params![user_id])?;
        let statuses = tx.execute("DELETE FROM status_updates WHERE user_id = ?1", params![user_id])?;
        let contacts = tx.execute("DELETE FROM contacts WHERE owner_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM starred_messages WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;

        tx.commit()?;

        tracing::info!(
            user_id = %user_id,
            chats,
            stray_messages = messages,
            statuses,
            contacts,
            "account deleted"
        );
        Ok(())
    }

    pub(crate) fn require_user(&self, user_id: &str) -> Result<User> {
        or_not_found(
            self.conn().query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
                row_to_user,
            ),
            || format!("user {user_id}"),
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` selected with [`USER_COLUMNS`] to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let last_seen: Option<i64> = row.get(6)?;
    Ok(User {
        user_id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        avatar: row.get(3)?,
        status: row.get(4)?,
        is_online: row.get(5)?,
        last_seen: last_seen.map(|ms| from_millis(6, ms)).transpose()?,
        created_at: from_millis(7, row.get(7)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use nhapp_shared::types::{ChatKind, MessageKind};
    use nhapp_shared::ManualClock;

    use crate::models::NewMessage;

    fn db_with_clock() -> (Database, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let db = Database::open_in_memory().unwrap().with_clock(clock.clone());
        (db, clock)
    }

    #[test]
    fn create_or_get_is_idempotent_per_normalised_email() {
        let (db, clock) = db_with_clock();

        let first = db.create_or_get_user("Alice@Example.com", "Alice").unwrap();
        clock.advance(Duration::seconds(5));
        let second = db.create_or_get_user("  alice@example.COM", "Someone else").unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(second.name, "Alice");
        assert_eq!(first.email, "alice@example.com");
        assert!(first.user_id.starts_with("alice@example.com_"));
        assert_eq!(first.status.as_deref(), Some(DEFAULT_STATUS_TEXT));
        assert!(first.is_online);
    }

    #[test]
    fn create_rejects_bad_input() {
        let (db, _) = db_with_clock();
        assert!(matches!(
            db.create_or_get_user("not-an-email", "Bob"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.create_or_get_user("bob@example.com", "   "),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn update_profile_ignores_empty_fields() {
        let (db, _) = db_with_clock();
        let user = db.create_or_get_user("carol@example.com", "Carol").unwrap();

        let updated = db
            .update_profile(
                &user.user_id,
                &ProfileUpdate {
                    name: Some(String::new()),
                    avatar: Some("avatar-handle".into()),
                    status: Some("Busy".into()),
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Carol");
        assert_eq!(updated.avatar.as_deref(), Some("avatar-handle"));
        assert_eq!(updated.status.as_deref(), Some("Busy"));

        let reloaded = db.get_user_by_id(&user.user_id).unwrap().unwrap();
        assert_eq!(reloaded, updated);
    }

    #[test]
    fn update_profile_unknown_user() {
        let (db, _) = db_with_clock();
        let err = db.update_profile("ghost", &ProfileUpdate::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        let (db, clock) = db_with_clock();
        for i in 0..12 {
            db.create_or_get_user(&format!("member{i}@team.io"), "Member").unwrap();
            clock.advance(Duration::milliseconds(1));
        }
        db.create_or_get_user("outsider@else.org", "Out").unwrap();

        let hits = db.search_users("TEAM").unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|u| u.email.contains("team")));

        assert_eq!(db.search_users("else").unwrap().len(), 1);
        assert!(db.search_users("nobody").unwrap().is_empty());
    }

    #[test]
    fn delete_account_cascades() {
        let (db, _) = db_with_clock();
        let alice = db.create_or_get_user("alice@example.com", "Alice").unwrap();
        let bob = db.create_or_get_user("bob@example.com", "Bob").unwrap();
        let carol = db.create_or_get_user("carol@example.com", "Carol").unwrap();

        let shared = db
            .create_private_chat(&[alice.user_id.clone(), bob.user_id.clone()], &alice.user_id)
            .unwrap();
        db.send_message(
            shared,
            NewMessage {
                sender_id: bob.user_id.clone(),
                text: "hi alice".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let unrelated = db
            .create_private_chat(&[bob.user_id.clone(), carol.user_id.clone()], &bob.user_id)
            .unwrap();
        db.send_message(
            unrelated,
            NewMessage {
                sender_id: carol.user_id.clone(),
                text: "hi bob".into(),
                kind: MessageKind::Text,
                ..Default::default()
            },
        )
        .unwrap();
        let stray = db
            .send_message(
                unrelated,
                NewMessage {
                    sender_id: alice.user_id.clone(),
                    text: "alice was here".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(db.get_messages(unrelated).unwrap().len(), 2);

        db.create_status(&alice.user_id, nhapp_shared::types::StatusKind::Text, None, Some("hello"))
            .unwrap();
        db.add_contact(&alice.user_id, "bob@example.com", None).unwrap();

        db.delete_account(&alice.user_id).unwrap();

        assert!(db.get_user_by_id(&alice.user_id).unwrap().is_none());
        assert!(db.get_chat(shared).unwrap().is_none());
        assert!(db.list_contacts(&alice.user_id).unwrap().is_empty());
        assert!(db.list_active_statuses(&bob.user_id).unwrap().others.is_empty());

        let survivors = db.get_user_chats(&bob.user_id).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].kind, ChatKind::Private);
        let remaining = db.get_messages(unrelated).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sender_id, carol.user_id);
        assert_eq!(remaining[0].text, "hi bob");
        assert!(db.get_message(stray).unwrap().is_none());
    }

    #[test]
    fn delete_unknown_account() {
        let (db, _) = db_with_clock();
        assert!(matches!(db.delete_account("ghost"), Err(StoreError::NotFound(_))));
    }
}
