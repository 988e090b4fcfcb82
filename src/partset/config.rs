use crate::error::PartwatchError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll_interval_secs: u64,
    pub lookback_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3600,
            lookback_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    Sendmail,
    Smtp,
    Webhook,
}

impl AlertMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sendmail => "sendmail",
            Self::Smtp => "smtp",
            Self::Webhook => "webhook",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sendmail" => Ok(Self::Sendmail),
            "smtp" => Ok(Self::Smtp),
            "webhook" => Ok(Self::Webhook),
            other => Err(PartwatchError::InvalidConfig(format!(
                "unknown alert mode `{other}`: use `sendmail`, `smtp` or `webhook`"
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub mode: AlertMode,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub mailbox_label: String,
    pub sendmail_bin: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_starttls: bool,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            mode: AlertMode::Sendmail,
            sender: None,
            recipient: None,
            mailbox_label: "the monitored inbox".to_string(),
            sendmail_bin: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_starttls: true,
            smtp_username: None,
            smtp_password: None,
            webhook_url: None,
            webhook_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PartwatchConfig {
    pub watcher: WatcherConfig,
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialPartwatchConfig {
    watcher: Option<WatcherConfig>,
    alert: Option<AlertConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u16(var: &str, fallback: u16) -> u16 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u16>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &PartwatchConfig) -> Result<()> {
    if cfg.watcher.poll_interval_secs == 0 {
        return Err(anyhow!("invalid watcher poll interval: must be >= 1 second"));
    }
    if cfg.watcher.lookback_secs == 0 {
        return Err(anyhow!("invalid watcher lookback: must be >= 1 second"));
    }
    if cfg.alert.timeout_secs == 0 {
        return Err(anyhow!("invalid alert timeout: must be >= 1 second"));
    }
    if cfg.alert.smtp_port == 0 {
        return Err(anyhow!("invalid smtp port: must be >= 1"));
    }
    if cfg.alert.mailbox_label.trim().is_empty() {
        return Err(anyhow!("invalid alert mailbox label: cannot be empty"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("PARTWATCH_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("partwatch").join("partwatch.toml"))
}

fn merge_file_config(base: &mut PartwatchConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialPartwatchConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse partwatch config {}: {err}", path.display()))?;
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    if let Some(alert) = parsed.alert {
        base.alert = alert;
    }
    Ok(())
}

fn merge_env_overrides(cfg: &mut PartwatchConfig) -> Result<()> {
    cfg.watcher.poll_interval_secs =
        env_or_u64("PARTWATCH_POLL_INTERVAL_SECS", cfg.watcher.poll_interval_secs);
    cfg.watcher.lookback_secs = env_or_u64("PARTWATCH_LOOKBACK_SECS", cfg.watcher.lookback_secs);

    if let Ok(mode) = env::var("PARTWATCH_ALERT_MODE")
        && !mode.trim().is_empty()
    {
        cfg.alert.mode = AlertMode::parse(&mode)?;
    }
    cfg.alert.sender = env_or_optional("PARTWATCH_ALERT_SENDER", cfg.alert.sender.take());
    cfg.alert.recipient = env_or_optional("PARTWATCH_ALERT_RECIPIENT", cfg.alert.recipient.take());
    cfg.alert.mailbox_label = env_or_string("PARTWATCH_MAILBOX_LABEL", &cfg.alert.mailbox_label);
    cfg.alert.sendmail_bin =
        env_or_optional("PARTWATCH_SENDMAIL_BIN", cfg.alert.sendmail_bin.take());
    cfg.alert.smtp_host = env_or_optional("PARTWATCH_SMTP_HOST", cfg.alert.smtp_host.take());
    cfg.alert.smtp_port = env_or_u16("PARTWATCH_SMTP_PORT", cfg.alert.smtp_port);
    cfg.alert.smtp_starttls = env_or_bool("PARTWATCH_SMTP_STARTTLS", cfg.alert.smtp_starttls);
    cfg.alert.smtp_username =
        env_or_optional("PARTWATCH_SMTP_USERNAME", cfg.alert.smtp_username.take());
    cfg.alert.smtp_password =
        env_or_optional("PARTWATCH_SMTP_PASSWORD", cfg.alert.smtp_password.take());
    cfg.alert.webhook_url = env_or_optional("PARTWATCH_WEBHOOK_URL", cfg.alert.webhook_url.take());
    cfg.alert.webhook_token =
        env_or_optional("PARTWATCH_WEBHOOK_TOKEN", cfg.alert.webhook_token.take());
    cfg.alert.timeout_secs = env_or_u64("PARTWATCH_ALERT_TIMEOUT_SECS", cfg.alert.timeout_secs);
    Ok(())
}

pub fn load_config() -> Result<PartwatchConfig> {
    let mut cfg = PartwatchConfig::default();
    if let Some(path) = resolve_config_path() {
        merge_file_config(&mut cfg, &path)?;
    }
    merge_env_overrides(&mut cfg)?;

    validate(&cfg).map_err(|err| PartwatchError::InvalidConfig(err.to_string()))?;
    Ok(cfg)
}
