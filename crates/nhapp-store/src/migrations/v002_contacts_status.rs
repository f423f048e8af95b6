//! v002 -- Contacts, presence side tables and status posts.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS contacts (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    owner_id        TEXT NOT NULL,
    contact_email   TEXT NOT NULL,              -- lowercase
    contact_user_id TEXT,                       -- resolved at insert time only
    nickname        TEXT,
    created_at      INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_owner_email
    ON contacts(owner_id, contact_email);

CREATE TABLE IF NOT EXISTS typing_status (
    chat_id    TEXT NOT NULL,                   -- FK -> chats(id)
    user_id    TEXT NOT NULL,
    is_typing  INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    PRIMARY KEY (chat_id, user_id),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS status_updates (
    id         TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    user_id    TEXT NOT NULL,
    type       TEXT NOT NULL,                   -- image | text
    file_id    TEXT,
    text       TEXT,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_status_updates_user ON status_updates(user_id);
CREATE INDEX IF NOT EXISTS idx_status_updates_expires ON status_updates(expires_at);

CREATE TABLE IF NOT EXISTS status_views (
    status_id TEXT NOT NULL,                    -- FK -> status_updates(id)
    viewer_id TEXT NOT NULL,
    viewed_at INTEGER NOT NULL,

    PRIMARY KEY (status_id, viewer_id),
    FOREIGN KEY (status_id) REFERENCES status_updates(id) ON DELETE CASCADE
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
