use anyhow::Result;

use crate::commands::CommandReport;
use crate::partset::driver;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub once: bool,
    pub daemon: bool,
}

pub fn run(opts: &WatchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("watch");

    if opts.once && opts.daemon {
        report.issue("invalid flags: use only one of --once or --daemon");
        return Ok(report);
    }

    if opts.daemon {
        report.detail("starting partwatch in daemon mode");
        driver::run_daemon()?;
        return Ok(report);
    }

    let cycle = driver::run_once()?;
    report.detail("poll cycle completed");
    report.detail(format!("state_file={}", cycle.state_location));
    report.detail(format!("started_at={}", cycle.started_at.to_rfc3339()));
    report.detail(format!("window_start={}", cycle.window_start.to_rfc3339()));
    report.detail(format!("fetched={}", cycle.fetched));
    report.detail(format!("stale={}", cycle.stale));
    report.detail(format!("new_messages={}", cycle.stats.new_messages));
    report.detail(format!("duplicates={}", cycle.stats.duplicates));
    report.detail(format!("untracked={}", cycle.stats.untracked));
    report.detail(format!("closed_bases={}", cycle.stats.closed_bases));
    report.detail(format!("bases_updated={}", cycle.stats.bases_updated));
    report.detail(format!("tracked_subjects={}", cycle.tracked_subjects));
    report.detail(format!("completed_subjects={}", cycle.completed_subjects));
    for note in &cycle.repairs {
        report.detail(format!("repair: {note}"));
    }
    for base in &cycle.alerted {
        report.detail(format!("alerted={base}"));
    }

    Ok(report)
}
