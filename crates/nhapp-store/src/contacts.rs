//! Per-owner contact book keyed by normalised email.

use rusqlite::{params, OptionalExtension};

use nhapp_shared::types::{is_plausible_email, normalize_email, ContactId};

use crate::database::{from_millis, parse_column, to_millis, Database};
use crate::error::{Result, StoreError};
use crate::models::{AddContactOutcome, Contact, ContactEntry, DeviceContact, SyncReport};

const CONTACT_COLUMNS: &str =
    "id, owner_id, contact_email, contact_user_id, nickname, created_at";

impl Database {
    /// Add `email` to the owner's contacts, or update the nickname of an
    /// existing entry. The target user is resolved only when the row is
    /// first inserted.
    pub fn add_contact(
        &self,
        owner_id: &str,
        email: &str,
        nickname: Option<&str>,
    ) -> Result<AddContactOutcome> {
        let email = normalize_email(email);
        if !is_plausible_email(&email) {
            return Err(StoreError::invalid(format!("invalid email address: {email}")));
        }
        let nickname = nickname.filter(|n| !n.is_empty());

        if let Some(existing) = self.find_contact(owner_id, &email)? {
            if let Some(nick) = nickname {
                if existing.nickname.as_deref() != Some(nick) {
                    self.conn().execute(
                        "UPDATE contacts SET nickname = ?1 WHERE id = ?2",
                        params![nick, existing.id.to_string()],
                    )?;
                }
            }
            return Ok(AddContactOutcome {
                id: existing.id,
                is_new: false,
            });
        }

        let contact_user_id = self.get_user_by_email(&email)?.map(|u| u.user_id);
        let id = ContactId::new();

        self.conn().execute(
            "INSERT INTO contacts (id, owner_id, contact_email, contact_user_id, nickname, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                owner_id,
                email,
                contact_user_id,
                nickname,
                to_millis(self.now()),
            ],
        )?;

        tracing::debug!(owner_id = %owner_id, contact = %email, "contact added");
        Ok(AddContactOutcome { id, is_new: true })
    }

    /// Remove a contact; absent contacts are not an error.
    pub fn remove_contact(&self, owner_id: &str, email: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM contacts WHERE owner_id = ?1 AND contact_email = ?2",
            params![owner_id, normalize_email(email)],
        )?;
        Ok(affected > 0)
    }

    /// The owner's contacts, each with a fresh lookup of the user it points at.
    pub fn list_contacts(&self, owner_id: &str) -> Result<Vec<ContactEntry>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE owner_id = ?1
             ORDER BY created_at ASC, contact_email ASC"
        ))?;

        let rows = stmt.query_map(params![owner_id], row_to_contact)?;

        let mut entries = Vec::new();
        for row in rows {
            let contact = row?;
            let user_profile = match contact.contact_user_id.as_deref() {
                Some(user_id) => self.get_user_by_id(user_id)?.map(Into::into),
                None => None,
            };
            entries.push(ContactEntry {
                contact,
                user_profile,
            });
        }
        Ok(entries)
    }

    /// Import a device address book. Every email of every entry goes through
    /// [`Database::add_contact`] with the entry's name as nickname.
    pub fn sync_contacts(&self, owner_id: &str, device: &[DeviceContact]) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for entry in device {
            let emails: Vec<&str> = entry
                .emails
                .iter()
                .map(|e| e.trim())
                .filter(|e| is_plausible_email(e))
                .collect();

            if emails.is_empty() {
                report.skipped += 1;
                continue;
            }

            for email in emails {
                let outcome = self.add_contact(owner_id, email, entry.name.as_deref())?;
                if outcome.is_new {
                    report.added += 1;
                } else {
                    report.existing += 1;
                }
            }
        }

        tracing::info!(
            owner_id = %owner_id,
            added = report.added,
            existing = report.existing,
            skipped = report.skipped,
            "contacts synced"
        );
        Ok(report)
    }

    fn find_contact(&self, owner_id: &str, email: &str) -> Result<Option<Contact>> {
        let contact = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts WHERE owner_id = ?1 AND contact_email = ?2"
                ),
                params![owner_id, email],
                row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    let id: String = row.get(0)?;
    Ok(Contact {
        id: parse_column(0, &id)?,
        owner_id: row.get(1)?,
        contact_email: row.get(2)?,
        contact_user_id: row.get(3)?,
        nickname: row.get(4)?,
        created_at: from_millis(5, row.get(5)?)?,
    })
}
