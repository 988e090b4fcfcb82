use anyhow::Result;
use std::env;
use std::path::PathBuf;

const DAEMON_LOCK_FILE: &str = "partwatch.daemon.lock";

#[derive(Debug, Clone)]
pub struct PartwatchPaths {
    pub home: PathBuf,
    pub maildir: PathBuf,
    pub state_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl PartwatchPaths {
    pub fn daemon_lock_file(&self) -> PathBuf {
        self.logs_dir.join(DAEMON_LOCK_FILE)
    }

    pub fn audit_log_file(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<PartwatchPaths> {
    let home = match env::var("PARTWATCH_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("partwatch"),
    };

    let maildir = env_or_default_path("PARTWATCH_MAILDIR", home.join("Maildir"));
    let state_file = env_or_default_path(
        "PARTWATCH_STATE_FILE",
        home.join("state").join("partwatch_state.json"),
    );
    let logs_dir = env_or_default_path("PARTWATCH_LOGS_DIR", home.join("logs"));

    Ok(PartwatchPaths {
        home,
        maildir,
        state_file,
        logs_dir,
    })
}
