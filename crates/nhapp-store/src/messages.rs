use rusqlite::{params, OptionalExtension};

use nhapp_shared::constants::MESSAGE_PAGE_SIZE;
use nhapp_shared::types::{ChatId, MessageId, MessageKind, MessageStatus};

use crate::database::{from_millis, parse_column, to_millis, Database};
use crate::error::Result;
use crate::models::{Message, NewMessage};

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, chat_id, sender_id, text, type, file_id, status, reply_to, created_at";

impl Database {
    /// Append a message to a chat and refresh the chat's last-message cache.
    ///
    /// The insert and the chat patch commit together; the unread counter is
    /// incremented in place so concurrent sends cannot lose an increment.
    pub fn send_message(&self, chat_id: ChatId, new: NewMessage) -> Result<MessageId> {
        self.require_chat(chat_id)?;

        let id = MessageId::new();
        let now = to_millis(self.now());

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO messages (id, chat_id, sender_id, text, type, file_id, status, reply_to, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages))",
            params![
                id.to_string(),
                chat_id.to_string(),
                new.sender_id,
                new.text,
                new.kind.as_str(),
                new.file_id,
                MessageStatus::Sent.as_str(),
                new.reply_to.map(|r| r.to_string()),
                now,
            ],
        )?;
        tx.execute(
            "UPDATE chats
             SET updated_at = ?1, last_message = ?2, last_message_time = ?1,
                 unread_count = unread_count + 1
             WHERE id = ?3",
            params![now, new.text, chat_id.to_string()],
        )?;
        tx.commit()?;

        tracing::debug!(chat_id = %chat_id, message_id = %id, kind = %new.kind, "message sent");
        Ok(id)
    }

    /// The newest messages of a chat, newest first. Callers reverse for
    /// display.
    pub fn get_messages(&self, chat_id: ChatId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at DESC, seq DESC
             LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![chat_id.to_string(), MESSAGE_PAGE_SIZE], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            let mut message = row?;
            message.reactions = self.get_reactions(message.id)?;
            messages.push(message);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        let message = self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .optional()?;

        match message {
            Some(mut message) => {
                message.reactions = self.get_reactions(message.id)?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    /// Mark every message `user_id` did not send as read and reset the
    /// chat's unread counter. Returns how many messages changed.
    pub fn mark_read(&self, chat_id: ChatId, user_id: &str) -> Result<usize> {
        self.require_chat(chat_id)?;

        let tx = self.conn().unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE messages SET status = ?1
             WHERE chat_id = ?2 AND sender_id != ?3 AND status IN (?4, ?5)",
            params![
                MessageStatus::Read.as_str(),
                chat_id.to_string(),
                user_id,
                MessageStatus::Sent.as_str(),
                MessageStatus::Delivered.as_str(),
            ],
        )?;
        tx.execute(
            "UPDATE chats SET unread_count = 0 WHERE id = ?1",
            params![chat_id.to_string()],
        )?;
        tx.commit()?;

        tracing::debug!(chat_id = %chat_id, user_id = %user_id, updated, "marked read");
        Ok(updated)
    }

    /// Move every `sent` message in the chat to `delivered`.
    pub fn mark_delivered(&self, chat_id: ChatId) -> Result<usize> {
        let updated = self.conn().execute(
            "UPDATE messages SET status = ?1 WHERE chat_id = ?2 AND status = ?3",
            params![
                MessageStatus::Delivered.as_str(),
                chat_id.to_string(),
                MessageStatus::Sent.as_str(),
            ],
        )?;
        Ok(updated)
    }

    /// Put an image message into its terminal `viewed` state. Other message
    /// kinds are left untouched. Returns whether the message changed.
    pub fn mark_image_viewed(&self, id: MessageId) -> Result<bool> {
        let Some(message) = self.get_message(id)? else {
            return Ok(false);
        };
        if message.kind != MessageKind::Image
            || !message.status.can_advance_to(MessageStatus::Viewed)
        {
            return Ok(false);
        }

        self.conn().execute(
            "UPDATE messages SET status = ?1 WHERE id = ?2",
            params![MessageStatus::Viewed.as_str(), id.to_string()],
        )?;
        tracing::debug!(message_id = %id, "image marked viewed");
        Ok(true)
    }

    /// Hard delete. Returns `true` if a row was deleted.
    pub fn delete_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let chat_id: String = row.get(1)?;
    let kind: String = row.get(4)?;
    let status: String = row.get(6)?;
    let reply_to: Option<String> = row.get(7)?;

    Ok(Message {
        id: parse_column(0, &id)?,
        chat_id: parse_column(1, &chat_id)?,
        sender_id: row.get(2)?,
        text: row.get(3)?,
        kind: parse_column(4, &kind)?,
        file_id: row.get(5)?,
        status: parse_column(6, &status)?,
        reactions: Vec::new(),
        reply_to: reply_to.map(|r| parse_column(7, &r)).transpose()?,
        created_at: from_millis(8, row.get(8)?)?,
    })
}
