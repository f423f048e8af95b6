//! Transactional email through the Resend HTTP API.
//!
//! Bodies are rendered from Askama templates in `templates/`. With no API
//! key configured the client runs in dev mode: every message is written to
//! the log and reported as delivered.

use askama::Template;
use serde::Serialize;
use thiserror::Error;

use nhapp_shared::constants::{APP_NAME, INVITE_TTL_DAYS, OTP_TTL_MINUTES};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Template)]
#[template(path = "otp_code.html")]
struct OtpCodeEmail<'a> {
    app_name: &'a str,
    name: Option<&'a str>,
    code: &'a str,
    resend: bool,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "invite.html")]
struct InviteEmail<'a> {
    app_name: &'a str,
    from_name: &'a str,
    from_email: &'a str,
    to_email: &'a str,
    link: &'a str,
    ttl_days: i64,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// How a message left the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Logged,
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    api_key: Option<String>,
    from: String,
    endpoint: String,
}

impl EmailClient {
    pub fn new(api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from: from.into(),
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Send a sign-in passcode. `resend` switches the wording to "new code".
    pub async fn send_otp_code(
        &self,
        to: &str,
        name: Option<&str>,
        code: &str,
        resend: bool,
    ) -> Result<Delivery, EmailError> {
        let html = OtpCodeEmail {
            app_name: APP_NAME,
            name,
            code,
            resend,
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()?;

        let subject = if resend {
            format!("{APP_NAME} New Verification Code")
        } else {
            format!("{APP_NAME} Verification Code")
        };

        self.send(to, &subject, &html).await
    }

    pub async fn send_invite(
        &self,
        to: &str,
        from_name: &str,
        from_email: &str,
        link: &str,
    ) -> Result<Delivery, EmailError> {
        let html = InviteEmail {
            app_name: APP_NAME,
            from_name,
            from_email,
            to_email: to,
            link,
            ttl_days: INVITE_TTL_DAYS,
        }
        .render()?;

        let subject = format!("{from_name} invited you to {APP_NAME}!");
        self.send(to, &subject, &html).await
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<Delivery, EmailError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(to = %to, subject = %subject, body = %html, "[DEV MODE] email not sent");
            return Ok(Delivery::Logged);
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&OutgoingEmail {
                from: &self.from,
                to,
                subject,
                html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "email provider rejected message");
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %to, subject = %subject, "email sent");
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};

    type Inbox = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    /// Local stand-in for the provider; answers every POST with `status`.
    async fn fake_provider(status: StatusCode) -> (String, Inbox) {
        let inbox: Inbox = Arc::default();

        async fn accept(
            State((inbox, status)): State<(Inbox, StatusCode)>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> StatusCode {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            inbox.lock().unwrap().push((auth, body));
            status
        }

        let app = Router::new()
            .route("/emails", post(accept))
            .with_state((inbox.clone(), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/emails"), inbox)
    }

    #[test]
    fn otp_template_includes_code_and_name() {
        let html = OtpCodeEmail {
            app_name: APP_NAME,
            name: Some("Dana"),
            code: "123456",
            resend: false,
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()
        .unwrap();
        assert!(html.contains("Hello Dana,"));
        assert!(html.contains("123456"));
        assert!(html.contains("expire in 10 minutes"));
        assert!(!html.contains("new verification code"));
    }

    #[test]
    fn otp_template_without_name_and_resend_wording() {
        let html = OtpCodeEmail {
            app_name: APP_NAME,
            name: None,
            code: "654321",
            resend: true,
            ttl_minutes: OTP_TTL_MINUTES,
        }
        .render()
        .unwrap();
        assert!(html.contains("Hello,"));
        assert!(html.contains("Your new verification code is:"));
    }

    #[test]
    fn invite_template_escapes_sender_name() {
        let html = InviteEmail {
            app_name: APP_NAME,
            from_name: "<b>Eve</b>",
            from_email: "eve@example.com",
            to_email: "bob@example.com",
            link: "https://nhapp.com/invite/abc",
            ttl_days: INVITE_TTL_DAYS,
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Eve</b>"));
        assert!(html.contains("https://nhapp.com/invite/abc"));
        assert!(html.contains("expires in 7 days"));
    }

    #[tokio::test]
    async fn dev_mode_logs_instead_of_sending() {
        let client = EmailClient::new(None, "NHAPP <noreply@nhapp.com>");
        let delivery = client
            .send_otp_code("a@example.com", None, "111111", false)
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Logged);
    }

    #[tokio::test]
    async fn posts_json_with_bearer_key() {
        let (endpoint, inbox) = fake_provider(StatusCode::OK).await;
        let client = EmailClient::new(Some("re_test".into()), "NHAPP <noreply@nhapp.com>")
            .with_endpoint(endpoint);

        let delivery = client
            .send_invite("bob@example.com", "Ada", "ada@example.com", "https://nhapp.com/invite/x")
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Sent);

        let inbox = inbox.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        let (auth, body) = &inbox[0];
        assert_eq!(auth.as_deref(), Some("Bearer re_test"));
        assert_eq!(body["to"], "bob@example.com");
        assert_eq!(body["from"], "NHAPP <noreply@nhapp.com>");
        assert_eq!(body["subject"], "Ada invited you to NHAPP!");
    }

    #[tokio::test]
    async fn provider_rejection_is_an_error() {
        let (endpoint, _) = fake_provider(StatusCode::UNPROCESSABLE_ENTITY).await;
        let client = EmailClient::new(Some("re_test".into()), "NHAPP <noreply@nhapp.com>")
            .with_endpoint(endpoint);

        let err = client
            .send_otp_code("a@example.com", Some("A"), "222222", true)
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::Rejected { status: 422, .. }));
    }
}
