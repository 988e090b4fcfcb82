use crate::error::ErrorCode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectRecord {
    pub received: BTreeSet<u32>,
    pub completed: bool,
}

/// Everything that must survive a restart: per-base progress, the ids of
/// every message already looked at, and the bases whose alert went out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessState {
    pub schema_version: u32,
    pub subjects: BTreeMap<String, SubjectRecord>,
    pub processed_ids: BTreeSet<String>,
    pub alerted: BTreeSet<String>,
    pub last_cycle_epoch_secs: Option<u64>,
}

impl Default for ProcessState {
    fn default() -> Self {
        Self {
            schema_version: 1,
            subjects: BTreeMap::new(),
            processed_ids: BTreeSet::new(),
            alerted: BTreeSet::new(),
            last_cycle_epoch_secs: None,
        }
    }
}

impl ProcessState {
    pub fn is_alerted(&self, base: &str) -> bool {
        self.alerted.contains(base)
    }

    /// Record a dispatched alert. Refuses bases that are not completed so an
    /// `alerted` entry can never exist without its completion.
    pub fn mark_alerted(&mut self, base: &str) -> bool {
        let completed = self.subjects.get(base).is_some_and(|r| r.completed);
        if completed {
            self.alerted.insert(base.to_string());
        }
        completed
    }

    pub fn completed_count(&self) -> usize {
        self.subjects.values().filter(|r| r.completed).count()
    }
}

pub trait StateStore {
    /// Where the snapshot lives, for reports and logs.
    fn location(&self) -> String;
    fn load(&self) -> Result<ProcessState>;
    fn save(&self, state: &ProcessState) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn quarantine_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

impl StateStore for JsonFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<ProcessState> {
        if !self.path.exists() {
            return Ok(ProcessState::default());
        }

        let raw =
            fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))?;
        match serde_json::from_slice::<ProcessState>(&raw) {
            Ok(state) => Ok(state),
            Err(err) => {
                let quarantine = self.quarantine_path();
                let kept = fs::rename(&self.path, &quarantine).is_ok();
                warn!(
                    code = ErrorCode::E002StateCorrupt.as_str(),
                    path = %self.path.display(),
                    quarantined = kept,
                    error = %err,
                    "state snapshot unreadable; starting from empty state"
                );
                Ok(ProcessState::default())
            }
        }
    }

    fn save(&self, state: &ProcessState) -> Result<()> {
        let dir = parent_dir(&self.path);
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let data = serde_json::to_string_pretty(state)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage snapshot in {}", dir.display()))?;
        tmp.write_all(format!("{data}\n").as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
