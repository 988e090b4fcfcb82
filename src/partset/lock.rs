use crate::error::PartwatchError;
use crate::partset::paths::PartwatchPaths;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive claim on the daemon lock file. Released when dropped; if the
/// process dies instead, the OS drops the advisory lock and only the stale
/// file remains.
#[derive(Debug)]
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock so a daemon starting now never
        // locks a file that is about to disappear.
        let _ = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn read_lock_pid(path: &Path) -> Result<u32> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pid_str = raw
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(str::trim)
        .context("daemon lock file is empty")?;
    let pid = pid_str
        .parse::<u32>()
        .with_context(|| format!("invalid daemon pid in lock file: {pid_str}"))?;
    Ok(pid)
}

pub fn acquire(paths: &PartwatchPaths) -> Result<DaemonLock> {
    acquire_at(&paths.daemon_lock_file())
}

fn acquire_at(path: &Path) -> Result<DaemonLock> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    if FileExt::try_lock_exclusive(&file).is_err() {
        let pid = read_lock_pid(path)
            .map(|pid| pid.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        return Err(PartwatchError::DaemonLocked {
            path: path.display().to_string(),
            pid,
        }
        .into());
    }

    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_all()?;

    Ok(DaemonLock {
        file,
        path: path.to_path_buf(),
    })
}
