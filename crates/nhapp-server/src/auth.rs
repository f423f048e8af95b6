//! Passwordless sign-in by emailed passcode, and email invites.
//!
//! Passcodes and invites live in the store (`otp_codes`, `invites`) with
//! their expiry, so a restart does not void a code that is already in
//! someone's inbox. Expiry is checked on read; the background purge only
//! keeps the tables small.

use chrono::Duration;
use rand::distributions::Uniform;
use rand::Rng;
use serde::Serialize;

use nhapp_shared::constants::{INVITE_CODE_LEN, INVITE_TTL_DAYS, OTP_TTL_MINUTES};
use nhapp_shared::types::{is_plausible_email, normalize_email};
use nhapp_store::{InviteInfo, InviteRecord, OtpRecord, User};

use crate::db::SharedDb;
use crate::email::EmailClient;
use crate::error::ServerError;
use crate::rate_limit::RateLimiter;

const INVITE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Reply to the send/resend/invite calls.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// Result of a correct passcode.
///
/// `exists` tells the client whether the account was already there. When it
/// was not and no name was given with the passcode request, `user` is
/// absent and `message` asks for a name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn generate_otp_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

pub fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(Uniform::from(0..INVITE_ALPHABET.len()))
        .take(INVITE_CODE_LEN)
        .map(|i| INVITE_ALPHABET[i] as char)
        .collect()
}

#[derive(Clone)]
pub struct AuthGateway {
    db: SharedDb,
    email: EmailClient,
    throttle: RateLimiter<String>,
    invite_base_url: String,
}

impl AuthGateway {
    pub fn new(
        db: SharedDb,
        email: EmailClient,
        throttle: RateLimiter<String>,
        invite_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            email,
            throttle,
            invite_base_url: invite_base_url.into(),
        }
    }

    pub fn throttle(&self) -> &RateLimiter<String> {
        &self.throttle
    }

    /// Issue a fresh passcode for `email`, replacing any pending one, and
    /// mail it. `name` is remembered for account creation on verify.
    pub async fn send_otp(&self, email: &str, name: Option<&str>) -> Result<Ack, ServerError> {
        let email = normalize_email(email);
        if !is_plausible_email(&email) {
            return Err(ServerError::Validation("Invalid email address".to_string()));
        }
        self.check_throttle(&email).await?;

        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        let code = generate_otp_code();

        self.db.call(|db| {
            db.put_otp(&OtpRecord {
                email: email.clone(),
                code: code.clone(),
                name: name.clone(),
                expires_at: db.now() + Duration::minutes(OTP_TTL_MINUTES),
            })
        })?;

        self.email
            .send_otp_code(&email, name.as_deref(), &code, false)
            .await?;

        tracing::info!(email = %email, "passcode issued");
        Ok(Ack::ok("Verification code sent to your email"))
    }

    /// Check a passcode. On success the record is consumed and the account
    /// is looked up, or created when a name was supplied with the request.
    pub fn verify_otp(&self, email: &str, code: &str) -> Result<VerifyOutcome, ServerError> {
        let email = normalize_email(email);

        self.db.call(|db| -> Result<VerifyOutcome, ServerError> {
            let Some(stored) = db.get_otp(&email)? else {
                return Err(ServerError::NotFound(
                    "No OTP found. Please request a new code.".to_string(),
                ));
            };

            if db.now() > stored.expires_at {
                db.delete_otp(&email)?;
                return Err(ServerError::Expired(
                    "OTP expired. Please request a new code.".to_string(),
                ));
            }

            if stored.code != code.trim() {
                return Err(ServerError::Mismatch("Invalid OTP. Please try again.".to_string()));
            }

            db.delete_otp(&email)?;

            if let Some(user) = db.get_user_by_email(&email)? {
                tracing::info!(user_id = %user.user_id, "sign-in verified");
                return Ok(VerifyOutcome {
                    exists: true,
                    name: Some(user.name.clone()),
                    user: Some(user),
                    message: None,
                });
            }

            match stored.name {
                Some(name) => {
                    let user = db.create_or_get_user(&email, &name)?;
                    tracing::info!(user_id = %user.user_id, "account created on sign-in");
                    Ok(VerifyOutcome {
                        exists: false,
                        user: Some(user),
                        name: Some(name),
                        message: None,
                    })
                }
                None => Ok(VerifyOutcome {
                    exists: false,
                    user: None,
                    name: None,
                    message: Some("Please provide your name".to_string()),
                }),
            }
        })
    }

    /// Replace the pending passcode with a new one and a fresh window.
    pub async fn resend_otp(&self, email: &str) -> Result<Ack, ServerError> {
        let email = normalize_email(email);
        self.check_throttle(&email).await?;

        let code = generate_otp_code();
        let name = self.db.call(|db| -> Result<Option<String>, ServerError> {
            let Some(stored) = db.get_otp(&email)? else {
                return Err(ServerError::NotFound(
                    "No OTP request found. Please try again.".to_string(),
                ));
            };
            db.put_otp(&OtpRecord {
                email: email.clone(),
                code: code.clone(),
                name: stored.name.clone(),
                expires_at: db.now() + Duration::minutes(OTP_TTL_MINUTES),
            })?;
            Ok(stored.name)
        })?;

        self.email
            .send_otp_code(&email, name.as_deref(), &code, true)
            .await?;

        tracing::info!(email = %email, "passcode reissued");
        Ok(Ack::ok("New verification code sent to your email"))
    }

    pub async fn send_invite(
        &self,
        from_email: &str,
        from_name: &str,
        to_email: &str,
    ) -> Result<Ack, ServerError> {
        let to_email = normalize_email(to_email);
        if !is_plausible_email(&to_email) {
            return Err(ServerError::Validation("Invalid email address".to_string()));
        }

        let code = generate_invite_code();
        self.db.call(|db| {
            db.put_invite(&InviteRecord {
                code: code.clone(),
                from_email: from_email.to_string(),
                from_name: from_name.to_string(),
                to_email: to_email.clone(),
                expires_at: db.now() + Duration::days(INVITE_TTL_DAYS),
            })
        })?;

        let link = format!("{}/{}", self.invite_base_url, code);
        self.email
            .send_invite(&to_email, from_name, from_email, &link)
            .await?;

        tracing::info!(from = %from_email, to = %to_email, "invite sent");
        Ok(Ack::ok("Invite sent to user's email!"))
    }

    /// Who sent the invite, or `None` for unknown and expired codes.
    pub fn get_invite(&self, code: &str) -> Result<Option<InviteInfo>, ServerError> {
        self.db.call(|db| -> Result<Option<InviteInfo>, ServerError> {
            let Some(invite) = db.get_invite_record(code)? else {
                return Ok(None);
            };
            if db.now() > invite.expires_at {
                db.delete_invite(code)?;
                return Ok(None);
            }
            Ok(Some(InviteInfo {
                from_email: invite.from_email,
                from_name: invite.from_name,
            }))
        })
    }

    async fn check_throttle(&self, email: &str) -> Result<(), ServerError> {
        self.throttle.check(email.to_string()).await.map_err(|wait| {
            tracing::warn!(email = %email, "passcode throttle hit");
            ServerError::RateLimited(format!(
                "Too many codes requested. Please wait {} seconds.",
                wait.as_secs().max(1)
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nhapp_shared::ManualClock;
    use nhapp_store::Database;

    use crate::rate_limit::otp_throttle;

    fn gateway() -> (AuthGateway, SharedDb, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let db = SharedDb::new(Database::open_in_memory().unwrap().with_clock(clock.clone()));
        let email = EmailClient::new(None, "NHAPP <noreply@nhapp.com>");
        let gateway = AuthGateway::new(db.clone(), email, otp_throttle(), "https://nhapp.com/invite");
        (gateway, db, clock)
    }

    fn pending_code(db: &SharedDb, email: &str) -> String {
        db.call(|db| db.get_otp(email)).unwrap().unwrap().code
    }

    #[test]
    fn codes_have_expected_shape() {
        for _ in 0..50 {
            let code: u32 = generate_otp_code().parse().unwrap();
            assert!((100_000..=999_999).contains(&code));
        }
        let invite = generate_invite_code();
        assert_eq!(invite.len(), 13);
        assert!(invite.bytes().all(|b| INVITE_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn new_user_with_name_is_created_on_verify() {
        let (auth, db, _) = gateway();
        auth.send_otp(" New@Example.com", Some("Nia")).await.unwrap();

        let code = pending_code(&db, "new@example.com");
        let outcome = auth.verify_otp("new@example.com", &code).unwrap();

        assert!(!outcome.exists);
        assert_eq!(outcome.name.as_deref(), Some("Nia"));
        let user = outcome.user.unwrap();
        assert_eq!(user.email, "new@example.com");
        assert!(user.user_id.starts_with("new@example.com_"));

        // consumed
        assert!(matches!(
            auth.verify_otp("new@example.com", &code),
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn existing_user_is_returned() {
        let (auth, db, _) = gateway();
        db.call(|db| db.create_or_get_user("old@example.com", "Olga")).unwrap();

        auth.send_otp("old@example.com", None).await.unwrap();
        let code = pending_code(&db, "old@example.com");
        let outcome = auth.verify_otp("OLD@example.com", &code).unwrap();

        assert!(outcome.exists);
        assert_eq!(outcome.name.as_deref(), Some("Olga"));
    }

    #[tokio::test]
    async fn unknown_user_without_name_is_asked_for_one() {
        let (auth, db, _) = gateway();
        auth.send_otp("anon@example.com", Some("  ")).await.unwrap();
        let code = pending_code(&db, "anon@example.com");

        let outcome = auth.verify_otp("anon@example.com", &code).unwrap();
        assert!(!outcome.exists);
        assert!(outcome.user.is_none());
        assert_eq!(outcome.message.as_deref(), Some("Please provide your name"));
        assert!(db.call(|db| db.get_user_by_email("anon@example.com")).unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_record() {
        let (auth, db, _) = gateway();
        auth.send_otp("x@example.com", None).await.unwrap();
        let code = pending_code(&db, "x@example.com");
        let wrong = if code == "999999" { "100000" } else { "999999" };

        assert!(matches!(
            auth.verify_otp("x@example.com", wrong),
            Err(ServerError::Mismatch(_))
        ));
        assert!(auth.verify_otp("x@example.com", &code).is_ok());
    }

    #[tokio::test]
    async fn expired_code_is_removed() {
        let (auth, db, clock) = gateway();
        auth.send_otp("late@example.com", Some("Lee")).await.unwrap();
        let code = pending_code(&db, "late@example.com");

        clock.advance(Duration::minutes(10));
        // still pending at the deadline
        assert_eq!(pending_code(&db, "late@example.com"), code);
        clock.advance(Duration::milliseconds(1));

        assert!(matches!(
            auth.verify_otp("late@example.com", &code),
            Err(ServerError::Expired(_))
        ));
        assert!(matches!(
            auth.verify_otp("late@example.com", &code),
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let (auth, db, _) = gateway();
        for bad in ["not-an-email", "@", "a@", "@example.com"] {
            assert!(matches!(
                auth.send_otp(bad, None).await,
                Err(ServerError::Validation(_))
            ));
            assert!(matches!(
                auth.send_invite("ada@example.com", "Ada", bad).await,
                Err(ServerError::Validation(_))
            ));
        }
        assert!(db.call(|db| db.get_otp("a@")).unwrap().is_none());
    }

    #[tokio::test]
    async fn resend_keeps_name_and_refreshes_window() {
        let (auth, db, clock) = gateway();
        assert!(matches!(
            auth.resend_otp("nobody@example.com").await,
            Err(ServerError::NotFound(_))
        ));

        auth.send_otp("r@example.com", Some("Ray")).await.unwrap();
        clock.advance(Duration::minutes(9));
        auth.resend_otp("r@example.com").await.unwrap();
        clock.advance(Duration::minutes(9));

        let stored = db.call(|db| db.get_otp("r@example.com")).unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Ray"));
        let outcome = auth.verify_otp("r@example.com", &stored.code).unwrap();
        assert_eq!(outcome.user.unwrap().name, "Ray");
    }

    #[tokio::test]
    async fn throttle_limits_requests_per_email() {
        let (auth, _, _) = gateway();
        for _ in 0..3 {
            auth.send_otp("spam@example.com", None).await.unwrap();
        }
        assert!(matches!(
            auth.send_otp("spam@example.com", None).await,
            Err(ServerError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn invites_expire_after_seven_days() {
        let (auth, db, clock) = gateway();
        auth.send_invite("ada@example.com", "Ada", "Bob@Example.com")
            .await
            .unwrap();

        let code: String = db
            .call(|db| {
                db.conn()
                    .query_row("SELECT code FROM invites", [], |row| row.get(0))
                    .map_err(nhapp_store::StoreError::from)
            })
            .unwrap();

        let info = auth.get_invite(&code).unwrap().unwrap();
        assert_eq!(info.from_name, "Ada");
        assert_eq!(info.from_email, "ada@example.com");
        assert!(auth.get_invite("missing").unwrap().is_none());

        clock.advance(Duration::days(7) + Duration::milliseconds(1));
        assert!(auth.get_invite(&code).unwrap().is_none());
        assert!(db.call(|db| db.get_invite_record(&code)).unwrap().is_none());
    }
}
