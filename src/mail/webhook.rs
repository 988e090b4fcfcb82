use crate::mail::{Notifier, render_alert};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::time::Duration;

pub struct WebhookNotifier {
    url: String,
    token: Option<String>,
    recipient: Option<String>,
    mailbox_label: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(
        url: String,
        token: Option<String>,
        recipient: Option<String>,
        mailbox_label: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            url,
            token,
            recipient,
            mailbox_label,
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn describe(&self) -> String {
        format!("webhook:{}", self.url)
    }

    fn send_alert(&self, base: &str) -> Result<()> {
        let alert = render_alert(base, &self.mailbox_label);
        let payload = serde_json::json!({
            "base": base,
            "subject": alert.subject,
            "body": alert.body,
            "recipient": self.recipient,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .with_context(|| format!("webhook request to {} failed", self.url))?;
        if !response.status().is_success() {
            anyhow::bail!("webhook call failed with status {}", response.status());
        }
        Ok(())
    }
}
