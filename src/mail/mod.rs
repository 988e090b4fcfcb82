pub mod maildir;
pub mod sendmail;
pub mod smtp;
pub mod webhook;

use crate::error::PartwatchError;
use crate::partset::config::{AlertConfig, AlertMode};
use crate::partset::util::strip_control_chars;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lettre::Message;
use lettre::message::Mailbox as MailAddress;
use lettre::message::header::ContentType;
use std::time::SystemTime;

/// Envelope sender used when none is configured for local delivery.
pub const DEFAULT_SENDER: &str = "partwatch@localhost";

/// A message as handed over by a mailbox: just the parts the poll driver
/// needs, with header values already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub subject: Option<String>,
    pub date: Option<String>,
}

pub trait Mailbox {
    fn describe(&self) -> String;
    /// Messages that may have arrived at or after `since`. Implementations
    /// may return older ones too; the driver applies the exact window.
    fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawMessage>>;
}

pub trait Notifier {
    fn describe(&self) -> String;
    fn send_alert(&self, base: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

pub fn render_alert(base: &str, mailbox_label: &str) -> AlertMessage {
    AlertMessage {
        subject: format!("[ALERT] {base} - Complete Set Received"),
        body: format!(
            "ALERT: All parts (1, 2, 3) received for subject '{base}' in {mailbox_label}.\n"
        ),
    }
}

pub fn parse_address(raw: &str, role: &str) -> Result<MailAddress> {
    raw.trim().parse::<MailAddress>().map_err(|err| {
        PartwatchError::InvalidConfig(format!("invalid {role} address `{raw}`: {err}")).into()
    })
}

/// The alert as an RFC 5322 message. Header encoding and line folding are
/// lettre's job; the base only loses its control characters.
pub fn compose_alert(
    base: &str,
    from: &MailAddress,
    to: &MailAddress,
    mailbox_label: &str,
    now: DateTime<Utc>,
) -> Result<Message> {
    let alert = render_alert(&strip_control_chars(base), mailbox_label);
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(alert.subject)
        .date(SystemTime::from(now))
        .header(ContentType::TEXT_PLAIN)
        .body(alert.body)
        .context("failed to build alert message")
}

fn required(value: Option<String>, var: &str, mode: AlertMode) -> Result<String> {
    value.ok_or_else(|| {
        PartwatchError::InvalidConfig(format!("{var} is required for {} alerts", mode.as_str()))
            .into()
    })
}

/// Convert a `Date` header to UTC. Missing or unparseable dates become `now`.
pub fn message_timestamp(date: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    date.and_then(|raw| mailparse::dateparse(raw).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(now)
}

pub fn build_notifier(cfg: &AlertConfig) -> Result<Box<dyn Notifier>> {
    match cfg.mode {
        AlertMode::Sendmail => {
            let recipient = required(cfg.recipient.clone(), "PARTWATCH_ALERT_RECIPIENT", cfg.mode)?;
            let notifier = sendmail::SendmailNotifier::new(
                cfg.sendmail_bin.as_deref(),
                cfg.sender.as_deref(),
                &recipient,
                cfg.mailbox_label.clone(),
                cfg.timeout_secs,
            )?;
            Ok(Box::new(notifier))
        }
        AlertMode::Smtp => {
            let host = required(cfg.smtp_host.clone(), "PARTWATCH_SMTP_HOST", cfg.mode)?;
            let recipient = required(cfg.recipient.clone(), "PARTWATCH_ALERT_RECIPIENT", cfg.mode)?;
            // The login name doubles as the sender, as with most submission
            // servers.
            let sender = required(
                cfg.sender.clone().or_else(|| cfg.smtp_username.clone()),
                "PARTWATCH_ALERT_SENDER",
                cfg.mode,
            )?;
            let notifier = smtp::SmtpNotifier::new(
                smtp::SmtpSettings {
                    host,
                    port: cfg.smtp_port,
                    starttls: cfg.smtp_starttls,
                    username: cfg.smtp_username.clone(),
                    password: cfg.smtp_password.clone(),
                    timeout_secs: cfg.timeout_secs,
                },
                &sender,
                &recipient,
                cfg.mailbox_label.clone(),
            )?;
            Ok(Box::new(notifier))
        }
        AlertMode::Webhook => {
            let url = required(cfg.webhook_url.clone(), "PARTWATCH_WEBHOOK_URL", cfg.mode)?;
            let notifier = webhook::WebhookNotifier::new(
                url,
                cfg.webhook_token.clone(),
                cfg.recipient.clone(),
                cfg.mailbox_label.clone(),
                cfg.timeout_secs,
            )?;
            Ok(Box::new(notifier))
        }
    }
}
