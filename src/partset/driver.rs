use crate::error::{PartwatchError, code_of};
use crate::mail::maildir::MaildirMailbox;
use crate::mail::{Mailbox, Notifier, RawMessage, build_notifier, message_timestamp};
use crate::partset::audit::AuditLog;
use crate::partset::config::{PartwatchConfig, load_config};
use crate::partset::lock;
use crate::partset::paths::{PartwatchPaths, resolve_paths};
use crate::partset::state::{JsonFileStore, StateStore};
use crate::partset::subject::{MISSING_SUBJECT, parse_subject};
use crate::partset::tracker::{ObserveStats, Sighting, Tracker};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub started_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub state_location: String,
    pub fetched: usize,
    pub stale: usize,
    pub stats: ObserveStats,
    pub repairs: Vec<String>,
    pub newly_completed: Vec<String>,
    pub alerted: Vec<String>,
    pub tracked_subjects: usize,
    pub completed_subjects: usize,
}

/// One polling cycle: read the mailbox, fold what is new into the tracker,
/// alert on fresh completions, then persist. Nothing is saved unless every
/// step succeeds.
pub struct PollDriver<'a> {
    mailbox: &'a dyn Mailbox,
    notifier: &'a dyn Notifier,
    store: &'a dyn StateStore,
    tracker: Tracker,
    lookback: TimeDelta,
    audit: Option<AuditLog>,
}

impl<'a> PollDriver<'a> {
    pub fn new(
        mailbox: &'a dyn Mailbox,
        notifier: &'a dyn Notifier,
        store: &'a dyn StateStore,
        lookback_secs: u64,
    ) -> Self {
        let lookback_secs = i64::try_from(lookback_secs).unwrap_or(i64::MAX);
        Self {
            mailbox,
            notifier,
            store,
            tracker: Tracker::default(),
            lookback: TimeDelta::try_seconds(lookback_secs).unwrap_or(TimeDelta::MAX),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    fn audit(&self, phase: &str, status: &str, message: &str) {
        if let Some(audit) = &self.audit {
            audit.record(phase, status, message);
        }
    }

    /// The window reaches `lookback` behind whichever is earlier: now, or the
    /// previous cycle. Consecutive windows therefore overlap and a message
    /// delivered late, after the cycle that would have covered its `Date`,
    /// is still counted; the id set absorbs the overlap.
    fn window_start(
        &self,
        now: DateTime<Utc>,
        last_cycle_epoch_secs: Option<u64>,
    ) -> DateTime<Utc> {
        let anchor = last_cycle_epoch_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map_or(now, |previous| previous.min(now));
        anchor
            .checked_sub_signed(self.lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn sightings(
        &self,
        messages: &[RawMessage],
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (Vec<Sighting>, usize) {
        let mut stale = 0usize;
        let mut batch = Vec::with_capacity(messages.len());

        for message in messages {
            let received_at = message_timestamp(message.date.as_deref(), now);
            if received_at < window_start {
                stale += 1;
                continue;
            }

            let subject = message.subject.as_deref().unwrap_or(MISSING_SUBJECT);
            let parsed = parse_subject(subject);
            debug!(
                message_id = %message.id,
                base = %parsed.base,
                part = ?parsed.part,
                "parsed subject"
            );
            batch.push(Sighting {
                message_id: message.id.clone(),
                base: parsed.base,
                part: parsed.part,
            });
        }

        (batch, stale)
    }

    pub fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let mut state = self.store.load()?;
        let repairs = self.tracker.repair(&mut state);
        for note in &repairs {
            warn!(note = %note, "repaired state snapshot");
            self.audit("state", "repaired", note);
        }

        let window_start = self.window_start(now, state.last_cycle_epoch_secs);
        let messages = self
            .mailbox
            .fetch_since(window_start)
            .with_context(|| format!("failed to read {}", self.mailbox.describe()))?;
        let (batch, stale) = self.sightings(&messages, window_start, now);

        let observation = self.tracker.observe(&state, &batch);
        let mut next = observation.state;
        let mut alerted = Vec::new();

        for base in &observation.newly_completed {
            if let Err(err) = self.notifier.send_alert(base) {
                let reason = format!("{err:#}");
                error!(base = %base, notifier = %self.notifier.describe(), error = %reason, "alert dispatch failed");
                let failure = PartwatchError::AlertDispatch {
                    base: base.clone(),
                    reason,
                };
                self.audit(
                    "alert",
                    "failed",
                    &format!("code={} {failure}", failure.code().as_str()),
                );
                return Err(failure.into());
            }
            next.mark_alerted(base);
            info!(base = %base, notifier = %self.notifier.describe(), "complete set alert sent");
            self.audit("alert", "ok", &format!("base={base}"));
            alerted.push(base.clone());
        }

        next.last_cycle_epoch_secs = u64::try_from(now.timestamp()).ok();
        self.store.save(&next)?;

        let outcome = CycleOutcome {
            started_at: now,
            window_start,
            state_location: self.store.location(),
            fetched: messages.len(),
            stale,
            stats: observation.stats,
            repairs,
            newly_completed: observation.newly_completed.into_iter().collect(),
            alerted,
            tracked_subjects: next.subjects.len(),
            completed_subjects: next.completed_count(),
        };
        info!(
            fetched = outcome.fetched,
            stale = outcome.stale,
            new = outcome.stats.new_messages,
            duplicates = outcome.stats.duplicates,
            untracked = outcome.stats.untracked,
            alerted = outcome.alerted.len(),
            "cycle complete"
        );
        self.audit(
            "cycle",
            "ok",
            &format!(
                "fetched={} stale={} new={} duplicates={} untracked={} alerted={}",
                outcome.fetched,
                outcome.stale,
                outcome.stats.new_messages,
                outcome.stats.duplicates,
                outcome.stats.untracked,
                outcome.alerted.join(",")
            ),
        );
        Ok(outcome)
    }
}

/// Concrete collaborators for the configured environment.
struct Collaborators {
    mailbox: MaildirMailbox,
    notifier: Box<dyn Notifier>,
    store: JsonFileStore,
    audit: AuditLog,
}

impl Collaborators {
    fn build(paths: &PartwatchPaths, cfg: &PartwatchConfig) -> Result<Self> {
        Ok(Self {
            mailbox: MaildirMailbox::new(&paths.maildir),
            notifier: build_notifier(&cfg.alert)?,
            store: JsonFileStore::new(&paths.state_file),
            audit: AuditLog::new(paths.audit_log_file()),
        })
    }

    fn driver(&self, cfg: &PartwatchConfig) -> PollDriver<'_> {
        PollDriver::new(
            &self.mailbox,
            self.notifier.as_ref(),
            &self.store,
            cfg.watcher.lookback_secs,
        )
        .with_audit(self.audit.clone())
    }
}

pub fn run_once() -> Result<CycleOutcome> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let collaborators = Collaborators::build(&paths, &cfg)?;
    collaborators.driver(&cfg).run_cycle(Utc::now())
}

pub fn run_daemon() -> Result<()> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let collaborators = Collaborators::build(&paths, &cfg)?;
    let daemon_lock = lock::acquire(&paths)?;
    let driver = collaborators.driver(&cfg);
    info!(
        pid = std::process::id(),
        lock = %daemon_lock.path().display(),
        audit = %collaborators.audit.path().display(),
        poll_interval_secs = cfg.watcher.poll_interval_secs,
        "partwatch daemon started"
    );

    loop {
        if let Err(err) = driver.run_cycle(Utc::now()) {
            let code = code_of(&err).map(|c| c.as_str()).unwrap_or("-");
            error!(code = code, error = %format!("{err:#}"), "cycle failed; retrying next poll");
        }
        thread::sleep(Duration::from_secs(cfg.watcher.poll_interval_secs));
    }
}
