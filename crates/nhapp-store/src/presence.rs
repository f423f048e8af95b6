//! Online flags and typing indicators.
//!
//! Neither has an expiry job. A typing row is simply ignored once it is
//! older than [`TYPING_WINDOW_MS`], so a client that crashes mid-sentence
//! stops "typing" on its own.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use nhapp_shared::constants::TYPING_WINDOW_MS;
use nhapp_shared::types::ChatId;

use crate::database::{from_millis, parse_column, to_millis, Database};
use crate::error::Result;
use crate::models::{OnlineMap, OnlineStatus, TypingStatus};

impl Database {
    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Set the user's online flag. `last_seen` only moves when the user comes
    /// online, so after going offline it still holds the moment they last
    /// connected. Unknown users are ignored.
    pub fn update_presence(&self, user_id: &str, is_online: bool) -> Result<bool> {
        let affected = if is_online {
            self.conn().execute(
                "UPDATE users SET is_online = 1, last_seen = ?1 WHERE user_id = ?2",
                params![to_millis(self.now()), user_id],
            )?
        } else {
            self.conn().execute(
                "UPDATE users SET is_online = 0 WHERE user_id = ?1",
                params![user_id],
            )?
        };

        tracing::debug!(user_id = %user_id, is_online, "presence updated");
        Ok(affected > 0)
    }

    pub fn get_user_online_status(&self, user_id: &str) -> Result<OnlineStatus> {
        Ok(match self.get_user_by_id(user_id)? {
            Some(user) => OnlineStatus {
                is_online: user.is_online,
                last_seen: user.last_seen,
            },
            None => OnlineStatus {
                is_online: false,
                last_seen: None,
            },
        })
    }

    pub fn get_online_status(&self, user_ids: &[String]) -> Result<OnlineMap> {
        let mut statuses = OnlineMap::new();
        for user_id in user_ids {
            let online = self
                .get_user_by_id(user_id)?
                .map(|u| u.is_online)
                .unwrap_or(false);
            statuses.insert(user_id.clone(), online);
        }
        Ok(statuses)
    }

    // ------------------------------------------------------------------
    // Typing
    // ------------------------------------------------------------------

    /// Upsert the (chat, user) typing row.
    pub fn set_typing(&self, chat_id: ChatId, user_id: &str, is_typing: bool) -> Result<()> {
        self.require_chat(chat_id)?;
        self.conn().execute(
            "INSERT INTO typing_status (chat_id, user_id, is_typing, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id, user_id) DO UPDATE SET is_typing = excluded.is_typing,
                                                        updated_at = excluded.updated_at",
            params![chat_id.to_string(), user_id, is_typing, to_millis(self.now())],
        )?;
        Ok(())
    }

    /// Users currently typing in the chat: flag set and refreshed within
    /// the last five seconds.
    pub fn get_typing_status(&self, chat_id: ChatId) -> Result<Vec<TypingStatus>> {
        let cutoff = self.now() - Duration::milliseconds(TYPING_WINDOW_MS);

        let mut stmt = self.conn().prepare(
            "SELECT chat_id, user_id, is_typing, updated_at
             FROM typing_status
             WHERE chat_id = ?1 AND is_typing = 1 AND updated_at > ?2
             ORDER BY updated_at ASC",
        )?;

        let rows = stmt.query_map(params![chat_id.to_string(), to_millis(cutoff)], |row| {
            let chat_id: String = row.get(0)?;
            Ok(TypingStatus {
                chat_id: parse_column(0, &chat_id)?,
                user_id: row.get(1)?,
                is_typing: row.get(2)?,
                updated_at: from_millis(3, row.get(3)?)?,
            })
        })?;

        let mut typing = Vec::new();
        for row in rows {
            typing.push(row?);
        }
        Ok(typing)
    }

    /// Drop typing rows last touched before `older_than`.
    pub fn purge_stale_typing(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM typing_status WHERE updated_at < ?1",
            params![to_millis(older_than)],
        )?;
        Ok(removed)
    }
}
