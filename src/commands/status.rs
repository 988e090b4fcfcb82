use anyhow::Result;
use std::fs;

use crate::commands::CommandReport;
use crate::partset::config::{AlertMode, load_config};
use crate::partset::lock::read_lock_pid;
use crate::partset::paths::resolve_paths;
use crate::partset::state::ProcessState;
use crate::partset::tracker::{EXPECTED_PARTS, Tracker};
use crate::partset::util::pid_alive;

fn describe_parts(state: &ProcessState, base: &str) -> String {
    let Some(record) = state.subjects.get(base) else {
        return String::new();
    };
    let received = record
        .received
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let missing = EXPECTED_PARTS
        .iter()
        .filter(|part| !record.received.contains(*part))
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "subject base={base} received=[{received}] missing=[{missing}] completed={} alerted={}",
        record.completed,
        state.is_alerted(base)
    )
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("partwatch_home={}", paths.home.display()));
    report.detail(format!("maildir={}", paths.maildir.display()));
    report.detail(format!("state_file={}", paths.state_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    if !paths.maildir.is_dir() {
        report.issue(format!("missing maildir ({})", paths.maildir.display()));
    }

    match load_config() {
        Ok(cfg) => {
            report.detail(format!(
                "watcher.poll_interval_secs={}",
                cfg.watcher.poll_interval_secs
            ));
            report.detail(format!("watcher.lookback_secs={}", cfg.watcher.lookback_secs));
            report.detail(format!("alert.mode={}", cfg.alert.mode.as_str()));
            report.detail(format!(
                "alert.recipient={}",
                cfg.alert.recipient.as_deref().unwrap_or("<unset>")
            ));
            if cfg.alert.mode == AlertMode::Smtp {
                report.detail(format!(
                    "alert.smtp={}:{} starttls={}",
                    cfg.alert.smtp_host.as_deref().unwrap_or("<unset>"),
                    cfg.alert.smtp_port,
                    cfg.alert.smtp_starttls
                ));
            }
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    // Read-only view: a corrupt snapshot is reported here and quarantined by
    // the next watch cycle.
    let mut state = ProcessState::default();
    if paths.state_file.exists() {
        match fs::read(&paths.state_file)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_slice::<ProcessState>(&raw).map_err(Into::into))
        {
            Ok(loaded) => state = loaded,
            Err(err) => report.issue(format!(
                "state snapshot unreadable ({}): {err}",
                paths.state_file.display()
            )),
        }
    } else {
        report.detail("state snapshot not written yet");
    }

    let mut repaired = state.clone();
    for note in Tracker::default().repair(&mut repaired) {
        report.issue(format!("state inconsistency: {note}"));
    }

    report.detail(format!("tracked_subjects={}", state.subjects.len()));
    report.detail(format!("completed_subjects={}", state.completed_count()));
    report.detail(format!("alerted_subjects={}", state.alerted.len()));
    report.detail(format!("processed_messages={}", state.processed_ids.len()));
    if let Some(epoch) = state.last_cycle_epoch_secs {
        report.detail(format!("last_cycle_epoch_secs={epoch}"));
    }
    for base in state.subjects.keys() {
        report.detail(describe_parts(&state, base));
    }

    let lock_path = paths.daemon_lock_file();
    if lock_path.exists() {
        match read_lock_pid(&lock_path) {
            Ok(pid) if pid_alive(pid) => report.detail(format!("daemon=running pid={pid}")),
            Ok(pid) => report.detail(format!("daemon=stale-lock pid={pid}")),
            Err(err) => report.issue(format!("daemon lock unreadable: {err:#}")),
        }
    } else {
        report.detail("daemon=stopped");
    }

    Ok(report)
}
