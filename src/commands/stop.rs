use anyhow::Result;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::commands::CommandReport;
use crate::partset::lock::read_lock_pid;
use crate::partset::paths::resolve_paths;
use crate::partset::util::{process_command_line, process_running, terminate};

const STOP_TIMEOUT: Duration = Duration::from_secs(8);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn looks_like_daemon(command_line: &str) -> bool {
    command_line.contains("partwatch")
        && command_line.contains("watch")
        && command_line.contains("--daemon")
}

fn cleanup_lock_file(lock_path: &Path, report: &mut CommandReport) {
    match fs::remove_file(lock_path) {
        Ok(()) => report.detail(format!("removed daemon lock {}", lock_path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => report.detail(format!(
            "failed to remove daemon lock {}: {}",
            lock_path.display(),
            err
        )),
    }
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("stop");
    let lock_path = resolve_paths()?.daemon_lock_file();
    report.detail(format!("daemon_lock={}", lock_path.display()));

    if !lock_path.exists() {
        report.detail("daemon already stopped (lock file not found)");
        return Ok(report);
    }

    let pid = match read_lock_pid(&lock_path) {
        Ok(pid) => pid,
        Err(err) => {
            report.issue(format!(
                "failed to read daemon pid from lock {}: {err:#}",
                lock_path.display()
            ));
            return Ok(report);
        }
    };
    report.detail(format!("daemon_pid={pid}"));

    if !process_running(pid)? {
        report.detail(format!("daemon pid {pid} is not running"));
        cleanup_lock_file(&lock_path, &mut report);
        return Ok(report);
    }

    let command_line = process_command_line(pid)?;
    if !looks_like_daemon(&command_line) {
        report.issue(format!(
            "refusing to stop pid {pid}; command does not match partwatch daemon: {}",
            if command_line.is_empty() {
                "<unknown>"
            } else {
                command_line.as_str()
            }
        ));
        return Ok(report);
    }

    terminate(pid)?;
    let deadline = Instant::now() + STOP_TIMEOUT;
    while Instant::now() < deadline {
        if !process_running(pid)? {
            report.detail(format!("stopped partwatch daemon pid={pid}"));
            cleanup_lock_file(&lock_path, &mut report);
            return Ok(report);
        }
        thread::sleep(STOP_POLL_INTERVAL);
    }

    report.issue(format!(
        "timed out waiting for daemon pid {pid} to stop after {}s",
        STOP_TIMEOUT.as_secs()
    ));
    Ok(report)
}
