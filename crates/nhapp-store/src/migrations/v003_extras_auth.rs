//! v003 -- Reactions, starred messages, wallpapers, and the passcode /
//! invite tables that replace process-local maps.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- At most one reaction per user per message
CREATE TABLE IF NOT EXISTS reactions (
    message_id TEXT NOT NULL,                   -- FK -> messages(id)
    user_id    TEXT NOT NULL,
    emoji      TEXT NOT NULL,
    seq        INTEGER NOT NULL,                -- append order

    PRIMARY KEY (message_id, user_id),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS starred_messages (
    user_id    TEXT NOT NULL,
    message_id TEXT NOT NULL,
    chat_id    TEXT NOT NULL,
    created_at INTEGER NOT NULL,

    PRIMARY KEY (user_id, message_id)
);

CREATE INDEX IF NOT EXISTS idx_starred_user ON starred_messages(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS chat_wallpapers (
    chat_id    TEXT PRIMARY KEY NOT NULL,       -- FK -> chats(id)
    wallpaper  TEXT,
    updated_at INTEGER NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS otp_codes (
    email      TEXT PRIMARY KEY NOT NULL,       -- lowercase
    code       TEXT NOT NULL,
    name       TEXT,
    expires_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS invites (
    code       TEXT PRIMARY KEY NOT NULL,
    from_email TEXT NOT NULL,
    from_name  TEXT NOT NULL,
    to_email   TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
