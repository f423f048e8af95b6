//! Pending sign-in passcodes and invite codes.
//!
//! Both are short-lived. Lookups never hide expired rows: the auth layer
//! needs to tell "expired" apart from "never issued", so it compares
//! `expires_at` itself and deletes the row.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::{from_millis, to_millis, Database};
use crate::error::Result;
use crate::models::{InviteRecord, OtpRecord};

impl Database {
    // ------------------------------------------------------------------
    // Passcodes
    // ------------------------------------------------------------------

    /// Store the passcode for `record.email`, replacing any earlier one.
    pub fn put_otp(&self, record: &OtpRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO otp_codes (email, code, name, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO UPDATE SET code = excluded.code,
                                              name = excluded.name,
                                              expires_at = excluded.expires_at",
            params![
                record.email,
                record.code,
                record.name,
                to_millis(record.expires_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_otp(&self, email: &str) -> Result<Option<OtpRecord>> {
        let record = self
            .conn()
            .query_row(
                "SELECT email, code, name, expires_at FROM otp_codes WHERE email = ?1",
                params![email],
                |row| {
                    Ok(OtpRecord {
                        email: row.get(0)?,
                        code: row.get(1)?,
                        name: row.get(2)?,
                        expires_at: from_millis(3, row.get(3)?)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn delete_otp(&self, email: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM otp_codes WHERE email = ?1", params![email])?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Invites
    // ------------------------------------------------------------------

    pub fn put_invite(&self, invite: &InviteRecord) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO invites (code, from_email, from_name, to_email, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                invite.code,
                invite.from_email,
                invite.from_name,
                invite.to_email,
                to_millis(invite.expires_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_invite_record(&self, code: &str) -> Result<Option<InviteRecord>> {
        let invite = self
            .conn()
            .query_row(
                "SELECT code, from_email, from_name, to_email, expires_at
                 FROM invites WHERE code = ?1",
                params![code],
                |row| {
                    Ok(InviteRecord {
                        code: row.get(0)?,
                        from_email: row.get(1)?,
                        from_name: row.get(2)?,
                        to_email: row.get(3)?,
                        expires_at: from_millis(4, row.get(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(invite)
    }

    pub fn delete_invite(&self, code: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM invites WHERE code = ?1", params![code])?;
        Ok(affected > 0)
    }

    /// Drop passcodes and invites whose expiry lies strictly before `now`.
    /// Returns `(passcodes, invites)` removed.
    pub fn purge_expired_auth(&self, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let cutoff = to_millis(now);
        let tx = self.conn().unchecked_transaction()?;
        let otps = tx.execute("DELETE FROM otp_codes WHERE expires_at < ?1", params![cutoff])?;
        let invites = tx.execute("DELETE FROM invites WHERE expires_at < ?1", params![cutoff])?;
        tx.commit()?;

        if otps + invites > 0 {
            tracing::debug!(otps, invites, "purged expired auth records");
        }
        Ok((otps, invites))
    }
}
