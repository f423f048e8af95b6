//! Ephemeral status posts.
//!
//! A post is visible while `expires_at > now`. Reads filter on that; the
//! server additionally runs [`Database::purge_expired_statuses`] on a timer
//! so expired rows do not pile up.

use std::collections::HashMap;

use chrono::Duration;
use rusqlite::{params, OptionalExtension};

use nhapp_shared::constants::STATUS_TTL_HOURS;
use nhapp_shared::types::{StatusId, StatusKind};

use crate::database::{from_millis, parse_column, to_millis, Database};
use crate::error::{Result, StoreError};
use crate::models::{StatusAuthor, StatusFeed, StatusGroup, StatusUpdate, StatusViewer};

const STATUS_COLUMNS: &str = "id, user_id, type, file_id, text, created_at, expires_at";

impl Database {
    /// Publish a post that expires 24 hours from now.
    pub fn create_status(
        &self,
        user_id: &str,
        kind: StatusKind,
        file_id: Option<&str>,
        text: Option<&str>,
    ) -> Result<StatusId> {
        let file_id = file_id.filter(|f| !f.is_empty());
        let text = text.filter(|t| !t.trim().is_empty());
        match kind {
            StatusKind::Image if file_id.is_none() => {
                return Err(StoreError::invalid("image status needs a file id"));
            }
            StatusKind::Text if text.is_none() => {
                return Err(StoreError::invalid("text status needs text"));
            }
            _ => {}
        }

        let id = StatusId::new();
        let now = self.now();
        let expires_at = now + Duration::hours(STATUS_TTL_HOURS);

        self.conn().execute(
            "INSERT INTO status_updates (id, user_id, type, file_id, text, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                user_id,
                kind.as_str(),
                file_id,
                text,
                to_millis(now),
                to_millis(expires_at),
            ],
        )?;

        tracing::info!(status_id = %id, user_id = %user_id, kind = %kind, "status posted");
        Ok(id)
    }

    pub fn get_status(&self, id: StatusId) -> Result<Option<StatusUpdate>> {
        let status = self
            .conn()
            .query_row(
                &format!("SELECT {STATUS_COLUMNS} FROM status_updates WHERE id = ?1"),
                params![id.to_string()],
                row_to_status,
            )
            .optional()?;
        Ok(status)
    }

    /// Live posts grouped by author. The caller's own group is split out as
    /// `me`; everyone else is ordered by their latest post, newest first.
    /// Posts by authors no longer in the directory are dropped.
    pub fn list_active_statuses(&self, current_user_id: &str) -> Result<StatusFeed> {
        let now = to_millis(self.now());

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {STATUS_COLUMNS} FROM status_updates
             WHERE expires_at > ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![now], row_to_status)?;

        let mut order: Vec<String> = Vec::new();
        let mut by_author: HashMap<String, Vec<StatusUpdate>> = HashMap::new();
        for row in rows {
            let status = row?;
            if !by_author.contains_key(&status.user_id) {
                order.push(status.user_id.clone());
            }
            by_author.entry(status.user_id.clone()).or_default().push(status);
        }

        let mut me = None;
        let mut others = Vec::new();
        for user_id in order {
            let Some(user) = self.get_user_by_id(&user_id)? else {
                continue;
            };
            let group = StatusGroup {
                user: StatusAuthor {
                    user_id: user.user_id,
                    name: user.name,
                    avatar: user.avatar,
                },
                statuses: by_author.remove(&user_id).unwrap_or_default(),
            };
            if user_id == current_user_id {
                me = Some(group);
            } else {
                others.push(group);
            }
        }

        others.sort_by(|a, b| b.latest_post().cmp(&a.latest_post()));

        Ok(StatusFeed { me, others })
    }

    /// Record that `viewer_id` saw the post. Repeated views are ignored.
    pub fn mark_status_viewed(&self, status_id: StatusId, viewer_id: &str) -> Result<bool> {
        if self.get_status(status_id)?.is_none() {
            return Err(StoreError::not_found(format!("status {status_id}")));
        }

        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO status_views (status_id, viewer_id, viewed_at)
             VALUES (?1, ?2, ?3)",
            params![status_id.to_string(), viewer_id, to_millis(self.now())],
        )?;
        Ok(affected > 0)
    }

    /// Everyone who viewed the post, joined with their directory entry.
    pub fn get_status_viewers(&self, status_id: StatusId) -> Result<Vec<StatusViewer>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.user_id, u.name, u.avatar, v.viewed_at
             FROM status_views v
             JOIN users u ON u.user_id = v.viewer_id
             WHERE v.status_id = ?1
             ORDER BY v.viewed_at ASC",
        )?;

        let rows = stmt.query_map(params![status_id.to_string()], |row| {
            Ok(StatusViewer {
                user_id: row.get(0)?,
                name: row.get(1)?,
                avatar: row.get(2)?,
                viewed_at: from_millis(3, row.get(3)?)?,
            })
        })?;

        let mut viewers = Vec::new();
        for row in rows {
            viewers.push(row?);
        }
        Ok(viewers)
    }

    pub fn delete_status(&self, status_id: StatusId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM status_updates WHERE id = ?1",
            params![status_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Remove every post whose expiry has passed. Returns how many went.
    pub fn purge_expired_statuses(&self) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM status_updates WHERE expires_at <= ?1",
            params![to_millis(self.now())],
        )?;
        if removed > 0 {
            tracing::info!(removed, "purged expired statuses");
        }
        Ok(removed)
    }
}

fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusUpdate> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    Ok(StatusUpdate {
        id: parse_column(0, &id)?,
        user_id: row.get(1)?,
        kind: parse_column(2, &kind)?,
        file_id: row.get(3)?,
        text: row.get(4)?,
        created_at: from_millis(5, row.get(5)?)?,
        expires_at: from_millis(6, row.get(6)?)?,
    })
}
