//! Error alerts to the operator by SMTP mail.

use std::time::Duration;

use dropskeet_common::AppConfig;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::AlertError;

pub const ALERT_SUBJECT: &str = "Error in Bluesky Raindrop Poster";

/// Where failure reports go.
pub trait AlertSink {
    fn send_alert(&self, message: &str) -> impl Future<Output = Result<(), AlertError>> + Send;
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub login: String,
    pub password: String,
    pub recipient: String,
    pub timeout: Duration,
}

impl From<&AppConfig> for MailConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            smtp_server: config.smtp_server.clone(),
            smtp_port: config.smtp_port,
            login: config.smtp_login.clone(),
            password: config.smtp_password.clone(),
            recipient: config.admin_email.clone(),
            timeout: config.http_timeout,
        }
    }
}

/// Sends alerts over implicit-TLS SMTP, authenticating as the sender.
#[derive(Debug, Clone)]
pub struct MailAlerter {
    config: MailConfig,
}

impl MailAlerter {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn body(message: &str) -> String {
        format!("An error occurred in the Bluesky Raindrop Poster:\n\n{message}")
    }

    /// The alert mail for `message`, from the SMTP login to the operator.
    pub fn message(&self, message: &str) -> Result<Message, AlertError> {
        let from = mailbox(&self.config.login)?;
        let to = mailbox(&self.config.recipient)?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(ALERT_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(Self::body(message))
            .map_err(|source| AlertError::Build { source })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, AlertError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_server)
            .map_err(|source| AlertError::Transport { source })?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.login.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(self.config.timeout))
            .build();
        Ok(transport)
    }
}

impl AlertSink for MailAlerter {
    #[tracing::instrument(skip_all, fields(to = %self.config.recipient))]
    async fn send_alert(&self, message: &str) -> Result<(), AlertError> {
        let email = self.message(message)?;
        self.transport()?
            .send(email)
            .await
            .map_err(|source| AlertError::Transport { source })?;
        tracing::info!("error alert sent");
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, AlertError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|source| AlertError::Address {
            address: address.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alerter(recipient: &str) -> MailAlerter {
        MailAlerter::new(MailConfig {
            smtp_server: "smtp.example.com".into(),
            smtp_port: 465,
            login: "poster@example.com".into(),
            password: "hunter2".into(),
            recipient: recipient.into(),
            timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_alert_message_headers_and_body() {
        let email = alerter("admin@example.com")
            .message("Failed to post to Bluesky: boom")
            .unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("From: poster@example.com"));
        assert!(formatted.contains("To: admin@example.com"));
        assert!(formatted.contains(&format!("Subject: {ALERT_SUBJECT}")));
        assert!(formatted.contains("An error occurred in the Bluesky Raindrop Poster:"));
        assert!(formatted.contains("Failed to post to Bluesky: boom"));
    }

    #[test]
    fn test_invalid_recipient() {
        let err = alerter("not an address").message("x").unwrap_err();
        assert!(matches!(err, AlertError::Address { .. }));
    }

    #[test]
    fn test_body_format() {
        assert_eq!(
            MailAlerter::body("boom"),
            "An error occurred in the Bluesky Raindrop Poster:\n\nboom"
        );
    }
}
