use crate::mail::{Notifier, compose_alert, parse_address};
use anyhow::{Context, Result};
use chrono::Utc;
use lettre::message::Mailbox as MailAddress;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub starttls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

/// Submits the alert to an SMTP relay, upgrading with STARTTLS and logging
/// in when credentials are configured.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    endpoint: String,
    from: MailAddress,
    to: MailAddress,
    mailbox_label: String,
}

impl SmtpNotifier {
    pub fn new(
        settings: SmtpSettings,
        sender: &str,
        recipient: &str,
        mailbox_label: String,
    ) -> Result<Self> {
        let builder = if settings.starttls {
            SmtpTransport::starttls_relay(&settings.host)
                .with_context(|| format!("invalid smtp host `{}`", settings.host))?
        } else {
            SmtpTransport::builder_dangerous(&settings.host)
        };
        let mut builder = builder
            .port(settings.port)
            .timeout(Some(Duration::from_secs(settings.timeout_secs)));
        if let Some(username) = settings.username {
            builder = builder.credentials(Credentials::new(
                username,
                settings.password.unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            endpoint: format!("{}:{}", settings.host, settings.port),
            from: parse_address(sender, "sender")?,
            to: parse_address(recipient, "recipient")?,
            mailbox_label,
        })
    }
}

impl Notifier for SmtpNotifier {
    fn describe(&self) -> String {
        format!("smtp:{} to={}", self.endpoint, self.to.email)
    }

    fn send_alert(&self, base: &str) -> Result<()> {
        let message = compose_alert(base, &self.from, &self.to, &self.mailbox_label, Utc::now())?;
        self.transport
            .send(&message)
            .with_context(|| format!("smtp delivery via {} failed", self.endpoint))?;
        Ok(())
    }
}
