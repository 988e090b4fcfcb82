use crate::partset::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub message: String,
}

/// Append-only JSON-lines trail of cycles and alerts.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_event(&self, phase: &str, status: &str, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let event = AuditEvent {
            at_epoch_secs: now_epoch_secs()?,
            phase: phase.to_string(),
            status: status.to_string(),
            message: message.to_string(),
        };

        let line = format!("{}\n", serde_json::to_string(&event)?);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Best-effort variant: a broken audit trail is logged, never fatal.
    pub fn record(&self, phase: &str, status: &str, message: &str) {
        if let Err(err) = self.append_event(phase, status, message) {
            warn!(path = %self.path.display(), error = %format!("{err:#}"), "audit append failed");
        }
    }
}
