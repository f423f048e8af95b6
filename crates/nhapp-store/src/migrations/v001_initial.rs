//! v001 -- Initial schema creation.
//!
//! Creates the directory and conversation tables: `users`, `chats`,
//! `chat_participants` and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY NOT NULL,   -- "<email>_<unix-ms>"
    email      TEXT NOT NULL,               -- lowercase
    name       TEXT NOT NULL,
    avatar     TEXT,
    status     TEXT,                        -- free-text bio
    is_online  INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    last_seen  INTEGER,                     -- unix ms
    created_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    type              TEXT NOT NULL,              -- 'private' | 'group'
    name              TEXT,
    avatar            TEXT,
    pair_key          TEXT,                       -- sorted participant pair, private chats only
    last_message      TEXT,
    last_message_time INTEGER,
    unread_count      INTEGER NOT NULL DEFAULT 0,
    is_muted          INTEGER NOT NULL DEFAULT 0,
    is_archived       INTEGER NOT NULL DEFAULT 0,
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_pair_key
    ON chats(pair_key) WHERE pair_key IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_chats_updated ON chats(updated_at DESC);

CREATE TABLE IF NOT EXISTS chat_participants (
    chat_id  TEXT NOT NULL,                   -- FK -> chats(id)
    user_id  TEXT NOT NULL,
    position INTEGER NOT NULL,                -- keeps participant order stable
    is_admin INTEGER NOT NULL DEFAULT 0,

    PRIMARY KEY (chat_id, user_id),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chat_participants_user ON chat_participants(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    chat_id    TEXT NOT NULL,                 -- FK -> chats(id)
    sender_id  TEXT NOT NULL,
    text       TEXT NOT NULL,                 -- payload or storage handle
    type       TEXT NOT NULL,                 -- text | image | audio | video
    file_id    TEXT,
    status     TEXT NOT NULL,                 -- sent | delivered | read | viewed
    reply_to   TEXT,
    created_at INTEGER NOT NULL,
    seq        INTEGER NOT NULL,              -- insertion order tie-breaker

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_created
    ON messages(chat_id, created_at DESC, seq DESC);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
