//! CRUD operations for [`Chat`] records, participant membership and
//! per-chat wallpapers.

use rusqlite::{params, OptionalExtension};

use nhapp_shared::constants::FALLBACK_CHAT_NAME;
use nhapp_shared::types::{ChatId, ChatKind};

use crate::database::{from_millis, parse_column, to_millis, Database};
use crate::error::{Result, StoreError};
use crate::models::Chat;

const CHAT_COLUMNS: &str = "c.id, c.type, c.name, c.avatar, c.last_message, c.last_message_time,
     c.unread_count, c.is_muted, c.is_archived, c.created_at, c.updated_at";

/// Smallest group, creator included. Two people talk in a private chat.
const MIN_GROUP_SIZE: usize = 3;

/// Order-independent key identifying the private chat of a pair of users.
fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}\n{b}")
    } else {
        format!("{b}\n{a}")
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Return the private chat between the two participants, creating it if
    /// this pair has never talked before. Argument order does not matter.
    ///
    /// A new chat is named after (and takes the avatar of) the participant
    /// that is not `current_user_id`.
    pub fn create_private_chat(
        &self,
        participants: &[String],
        current_user_id: &str,
    ) -> Result<ChatId> {
        let [first, second] = participants else {
            return Err(StoreError::invalid(format!(
                "a private chat needs exactly 2 participants, got {}",
                participants.len()
            )));
        };
        if first == second {
            return Err(StoreError::invalid("private chat participants must differ"));
        }

        let key = pair_key(first, second);
        let existing: Option<String> = self
            .conn()
            .query_row("SELECT id FROM chats WHERE pair_key = ?1", params![key], |row| row.get(0))
            .optional()?;
        if let Some(id) = existing {
            return parse_column(0, &id).map_err(Into::into);
        }

        let other_id = if current_user_id == first.as_str() { second } else { first };
        let other = self.get_user_by_id(other_id)?;
        let name = other
            .as_ref()
            .map(|u| u.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_CHAT_NAME.to_string());
        let avatar = other.and_then(|u| u.avatar);

        let id = ChatId::new();
        let now = to_millis(self.now());

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO chats (id, type, name, avatar, pair_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id.to_string(), ChatKind::Private.as_str(), name, avatar, key, now],
        )?;
        for (position, user_id) in participants.iter().enumerate() {
            tx.execute(
                "INSERT INTO chat_participants (chat_id, user_id, position, is_admin)
                 VALUES (?1, ?2, ?3, 0)",
                params![id.to_string(), user_id, position as i64],
            )?;
        }
        tx.commit()?;

        tracing::info!(chat_id = %id, "created private chat");
        Ok(id)
    }

    /// Create a group chat. Groups are never de-duplicated; the creator is
    /// always a participant and the group's only admin.
    pub fn create_group_chat(
        &self,
        name: &str,
        participants: &[String],
        current_user_id: &str,
    ) -> Result<ChatId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("group name must not be empty"));
        }

        let mut members: Vec<&str> = Vec::with_capacity(participants.len() + 1);
        for user_id in participants.iter().map(String::as_str) {
            if !user_id.is_empty() && !members.contains(&user_id) {
                members.push(user_id);
            }
        }
        if !members.contains(&current_user_id) {
            members.insert(0, current_user_id);
        }
        if members.len() < MIN_GROUP_SIZE {
            return Err(StoreError::invalid(format!(
                "a group needs at least {MIN_GROUP_SIZE} participants, got {}",
                members.len()
            )));
        }

        let id = ChatId::new();
        let now = to_millis(self.now());

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO chats (id, type, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id.to_string(), ChatKind::Group.as_str(), name, now],
        )?;
        for (position, user_id) in members.iter().enumerate() {
            tx.execute(
                "INSERT INTO chat_participants (chat_id, user_id, position, is_admin)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), user_id, position as i64, *user_id == current_user_id],
            )?;
        }
        tx.commit()?;

        tracing::info!(chat_id = %id, members = members.len(), "created group chat");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_chat(&self, id: ChatId) -> Result<Option<Chat>> {
        let chat = self
            .conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.id = ?1"),
                params![id.to_string()],
                row_to_chat,
            )
            .optional()?;

        match chat {
            Some(mut chat) => {
                self.load_participants(&mut chat)?;
                Ok(Some(chat))
            }
            None => Ok(None),
        }
    }

    /// All chats the user participates in, most recently active first.
    pub fn get_user_chats(&self, user_id: &str) -> Result<Vec<Chat>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHAT_COLUMNS}
             FROM chats c
             JOIN chat_participants p ON p.chat_id = c.id
             WHERE p.user_id = ?1
             ORDER BY c.updated_at DESC, c.created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            let mut chat = row?;
            self.load_participants(&mut chat)?;
            chats.push(chat);
        }
        Ok(chats)
    }

    fn load_participants(&self, chat: &mut Chat) -> Result<()> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id, is_admin FROM chat_participants
             WHERE chat_id = ?1
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![chat.id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;

        chat.participants.clear();
        chat.admin_ids.clear();
        for row in rows {
            let (user_id, is_admin) = row?;
            if is_admin {
                chat.admin_ids.push(user_id.clone());
            }
            chat.participants.push(user_id);
        }
        Ok(())
    }

    pub(crate) fn require_chat(&self, id: ChatId) -> Result<()> {
        let found: Option<i64> = self
            .conn()
            .query_row("SELECT 1 FROM chats WHERE id = ?1", params![id.to_string()], |row| row.get(0))
            .optional()?;
        found
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("chat {id}")))
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn mute_chat(&self, id: ChatId) -> Result<()> {
        self.set_chat_flag(id, "is_muted", true)
    }

    pub fn unmute_chat(&self, id: ChatId) -> Result<()> {
        self.set_chat_flag(id, "is_muted", false)
    }

    pub fn archive_chat(&self, id: ChatId) -> Result<()> {
        self.set_chat_flag(id, "is_archived", true)
    }

    pub fn unarchive_chat(&self, id: ChatId) -> Result<()> {
        self.set_chat_flag(id, "is_archived", false)
    }

    fn set_chat_flag(&self, id: ChatId, column: &'static str, value: bool) -> Result<()> {
        let affected = self.conn().execute(
            &format!("UPDATE chats SET {column} = ?1 WHERE id = ?2"),
            params![value, id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(format!("chat {id}")));
        }
        tracing::debug!(chat_id = %id, flag = column, value, "chat flag updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Wallpaper
    // ------------------------------------------------------------------

    /// Set (or clear, with `None`) the wallpaper of a chat.
    pub fn set_wallpaper(&self, chat_id: ChatId, wallpaper: Option<&str>) -> Result<()> {
        self.require_chat(chat_id)?;
        self.conn().execute(
            "INSERT INTO chat_wallpapers (chat_id, wallpaper, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET wallpaper = excluded.wallpaper,
                                                updated_at = excluded.updated_at",
            params![chat_id.to_string(), wallpaper, to_millis(self.now())],
        )?;
        Ok(())
    }

    pub fn get_wallpaper(&self, chat_id: ChatId) -> Result<Option<String>> {
        let wallpaper: Option<Option<String>> = self
            .conn()
            .query_row(
                "SELECT wallpaper FROM chat_wallpapers WHERE chat_id = ?1",
                params![chat_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(wallpaper.flatten())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with `CHAT_COLUMNS` to a [`Chat`] with empty
/// membership lists.
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let last_message_time: Option<i64> = row.get(5)?;

    Ok(Chat {
        id: parse_column(0, &id)?,
        kind: parse_column(1, &kind)?,
        name: row.get(2)?,
        avatar: row.get(3)?,
        participants: Vec::new(),
        admin_ids: Vec::new(),
        last_message: row.get(4)?,
        last_message_time: last_message_time.map(|ms| from_millis(5, ms)).transpose()?,
        unread_count: row.get(6)?,
        is_muted: row.get(7)?,
        is_archived: row.get(8)?,
        created_at: from_millis(9, row.get(9)?)?,
        updated_at: from_millis(10, row.get(10)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use nhapp_shared::ManualClock;

    use crate::models::NewMessage;

    fn setup() -> (Database, Arc<ManualClock>, String, String) {
        let clock = Arc::new(ManualClock::starting_now());
        let db = Database::open_in_memory().unwrap().with_clock(clock.clone());
        let a = db.create_or_get_user("ann@example.com", "Ann").unwrap().user_id;
        let b = db.create_or_get_user("ben@example.com", "Ben").unwrap().user_id;
        (db, clock, a, b)
    }

    #[test]
    fn private_chat_is_unique_per_unordered_pair() {
        let (db, _, a, b) = setup();

        let first = db.create_private_chat(&[a.clone(), b.clone()], &a).unwrap();
        let second = db.create_private_chat(&[b.clone(), a.clone()], &b).unwrap();
        assert_eq!(first, second);

        let chat = db.get_chat(first).unwrap().unwrap();
        assert_eq!(chat.kind, ChatKind::Private);
        assert_eq!(chat.participants, vec![a.clone(), b.clone()]);
        assert_eq!(chat.name.as_deref(), Some("Ben"));
        assert_eq!(chat.unread_count, 0);
    }

    #[test]
    fn private_chat_with_unknown_user_uses_fallback_name() {
        let (db, _, a, _) = setup();
        let id = db.create_private_chat(&[a.clone(), "ghost".into()], &a).unwrap();
        let chat = db.get_chat(id).unwrap().unwrap();
        assert_eq!(chat.name.as_deref(), Some(FALLBACK_CHAT_NAME));
    }

    #[test]
    fn private_chat_requires_two_distinct_participants() {
        let (db, _, a, b) = setup();
        assert!(matches!(
            db.create_private_chat(&[a.clone()], &a),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.create_private_chat(&[a.clone(), b.clone(), "c".into()], &a),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.create_private_chat(&[a.clone(), a.clone()], &a),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn groups_are_never_deduplicated() {
        let (db, _, a, b) = setup();
        let members = vec![b.clone(), "cat".to_string(), b.clone()];

        let g1 = db.create_group_chat("Climbing", &members, &a).unwrap();
        let g2 = db.create_group_chat("Climbing", &members, &a).unwrap();
        assert_ne!(g1, g2);

        let chat = db.get_chat(g1).unwrap().unwrap();
        assert_eq!(chat.kind, ChatKind::Group);
        assert_eq!(chat.participants, vec![a.clone(), b.clone(), "cat".to_string()]);
        assert_eq!(chat.admin_ids, vec![a]);
    }

    #[test]
    fn group_needs_three_members() {
        let (db, _, a, b) = setup();
        let pair = vec![b.clone(), a.clone(), b.clone()];
        assert!(matches!(
            db.create_group_chat("Pair", &pair, &a),
            Err(StoreError::Validation(_))
        ));
        assert!(db.get_user_chats(&a).unwrap().is_empty());

        let trio = vec![b, "cat".to_string()];
        assert!(db.create_group_chat("Trio", &trio, &a).is_ok());
    }

    #[test]
    fn group_needs_a_name() {
        let (db, _, a, b) = setup();
        assert!(matches!(
            db.create_group_chat(" ", &[b], &a),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn user_chats_are_sorted_by_activity() {
        let (db, clock, a, b) = setup();
        let c = db.create_or_get_user("cy@example.com", "Cy").unwrap().user_id;

        let older = db.create_private_chat(&[a.clone(), b.clone()], &a).unwrap();
        clock.advance(Duration::seconds(1));
        let newer = db.create_private_chat(&[a.clone(), c.clone()], &a).unwrap();

        let ids: Vec<ChatId> = db.get_user_chats(&a).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer, older]);

        clock.advance(Duration::seconds(1));
        db.send_message(
            older,
            NewMessage {
                sender_id: b.clone(),
                text: "bump".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let ids: Vec<ChatId> = db.get_user_chats(&a).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![older, newer]);
        assert_eq!(db.get_user_chats(&c).unwrap().len(), 1);
    }

    #[test]
    fn flags_toggle() {
        let (db, _, a, b) = setup();
        let id = db.create_private_chat(&[a.clone(), b], &a).unwrap();

        db.mute_chat(id).unwrap();
        db.archive_chat(id).unwrap();
        let chat = db.get_chat(id).unwrap().unwrap();
        assert!(chat.is_muted && chat.is_archived);

        db.unmute_chat(id).unwrap();
        db.unarchive_chat(id).unwrap();
        let chat = db.get_chat(id).unwrap().unwrap();
        assert!(!chat.is_muted && !chat.is_archived);

        assert!(matches!(db.mute_chat(ChatId::new()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn wallpaper_upserts() {
        let (db, _, a, b) = setup();
        let id = db.create_private_chat(&[a.clone(), b], &a).unwrap();

        assert_eq!(db.get_wallpaper(id).unwrap(), None);
        db.set_wallpaper(id, Some("beach.jpg")).unwrap();
        db.set_wallpaper(id, Some("forest.jpg")).unwrap();
        assert_eq!(db.get_wallpaper(id).unwrap().as_deref(), Some("forest.jpg"));

        db.set_wallpaper(id, None).unwrap();
        assert_eq!(db.get_wallpaper(id).unwrap(), None);

        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM chat_wallpapers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
