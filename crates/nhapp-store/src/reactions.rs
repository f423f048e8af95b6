use rusqlite::params;

use nhapp_shared::constants::STARRED_PAGE_SIZE;
use nhapp_shared::types::{ChatId, MessageId};

use crate::database::{from_millis, to_millis, Database};
use crate::error::Result;
use crate::messages::MESSAGE_COLUMNS;
use crate::models::{Reaction, StarredMessage};

impl Database {
    /// Set the user's reaction on a message, replacing any earlier one.
    /// The replacement moves to the end of the reaction list. Unknown
    /// messages are ignored; returns whether a reaction was stored.
    pub fn add_reaction(&self, message_id: MessageId, emoji: &str, user_id: &str) -> Result<bool> {
        if self.get_message(message_id)?.is_none() {
            return Ok(false);
        }

        self.conn().execute(
            "INSERT INTO reactions (message_id, user_id, emoji, seq)
             VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(seq), 0) + 1 FROM reactions))
             ON CONFLICT(message_id, user_id) DO UPDATE SET emoji = excluded.emoji,
                                                          seq = excluded.seq",
            params![message_id.to_string(), user_id, emoji],
        )?;
        Ok(true)
    }

    pub fn remove_reaction(&self, message_id: MessageId, user_id: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2",
            params![message_id.to_string(), user_id],
        )?;
        Ok(affected > 0)
    }

    pub fn get_reactions(&self, message_id: MessageId) -> Result<Vec<Reaction>> {
        let mut stmt = self.conn().prepare(
            "SELECT emoji, user_id FROM reactions WHERE message_id = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![message_id.to_string()], |row| {
            Ok(Reaction {
                emoji: row.get(0)?,
                user_id: row.get(1)?,
            })
        })?;

        let mut reactions = Vec::new();
        for row in rows {
            reactions.push(row?);
        }
        Ok(reactions)
    }

    // ------------------------------------------------------------------
    // Stars
    // ------------------------------------------------------------------

    /// Star a message for a user. Starring twice is a no-op.
    pub fn star_message(&self, user_id: &str, message_id: MessageId, chat_id: ChatId) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO starred_messages (user_id, message_id, chat_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, message_id.to_string(), chat_id.to_string(), to_millis(self.now())],
        )?;
        Ok(affected > 0)
    }

    pub fn unstar_message(&self, user_id: &str, message_id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM starred_messages WHERE user_id = ?1 AND message_id = ?2",
            params![user_id, message_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// The user's most recent stars, newest first. Stars whose message has
    /// since been deleted are skipped.
    pub fn get_starred_messages(&self, user_id: &str) -> Result<Vec<StarredMessage>> {
        let columns = MESSAGE_COLUMNS
            .split(", ")
            .map(|c| format!("m.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {columns}, s.created_at
             FROM (SELECT message_id, created_at FROM starred_messages
                   WHERE user_id = ?1
                   ORDER BY created_at DESC
                   LIMIT ?2) s
             JOIN messages m ON m.id = s.message_id
             ORDER BY s.created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id, STARRED_PAGE_SIZE], |row| {
            let message = crate::messages::row_to_message(row)?;
            let starred_at = from_millis(9, row.get(9)?)?;
            Ok((message, starred_at))
        })?;

        let mut starred = Vec::new();
        for row in rows {
            let (mut message, starred_at) = row?;
            message.reactions = self.get_reactions(message.id)?;
            starred.push(StarredMessage { message, starred_at });
        }
        Ok(starred)
    }
}
