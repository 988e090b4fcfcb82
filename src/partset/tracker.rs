use crate::partset::state::ProcessState;
use std::collections::{BTreeMap, BTreeSet};

/// Ordinals that make up a complete set.
pub const EXPECTED_PARTS: [u32; 3] = [1, 2, 3];

/// One message as the tracker sees it. `part` is `None` for subjects the
/// parser could not anchor; those still count as processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub message_id: String,
    pub base: String,
    pub part: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveStats {
    pub new_messages: usize,
    pub duplicates: usize,
    pub untracked: usize,
    pub closed_bases: usize,
    pub bases_updated: usize,
}

#[derive(Debug, Clone)]
pub struct Observation {
    pub state: ProcessState,
    pub newly_completed: BTreeSet<String>,
    pub stats: ObserveStats,
}

#[derive(Debug, Clone)]
pub struct Tracker {
    expected: BTreeSet<u32>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            expected: EXPECTED_PARTS.into_iter().collect(),
        }
    }
}

impl Tracker {
    pub fn is_complete(&self, received: &BTreeSet<u32>) -> bool {
        self.expected.is_subset(received)
    }

    /// Fold one cycle's sightings into `prior` and report which bases became
    /// complete for the first time and still need their alert.
    ///
    /// Pure: the caller decides whether the returned state is kept.
    pub fn observe(&self, prior: &ProcessState, batch: &[Sighting]) -> Observation {
        let mut state = prior.clone();
        let mut stats = ObserveStats::default();
        let mut additions: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();

        for sighting in batch {
            if !state.processed_ids.insert(sighting.message_id.clone()) {
                stats.duplicates += 1;
                continue;
            }
            stats.new_messages += 1;

            let Some(part) = sighting.part else {
                stats.untracked += 1;
                continue;
            };
            additions
                .entry(sighting.base.as_str())
                .or_default()
                .insert(part);
        }

        let mut newly_completed = BTreeSet::new();
        for (base, parts) in additions {
            let record = state.subjects.entry(base.to_string()).or_default();
            if record.completed {
                stats.closed_bases += 1;
                continue;
            }

            let before = record.received.len();
            record.received.extend(parts);
            if record.received.len() != before {
                stats.bases_updated += 1;
            }

            if self.is_complete(&record.received) {
                record.completed = true;
                if !state.alerted.contains(base) {
                    newly_completed.insert(base.to_string());
                }
            }
        }

        Observation {
            state,
            newly_completed,
            stats,
        }
    }

    /// Bring a loaded snapshot back within the invariants: completed records
    /// must hold every expected part, and only completed bases may be alerted.
    /// Returns one note per change.
    pub fn repair(&self, state: &mut ProcessState) -> Vec<String> {
        let mut notes = Vec::new();

        for (base, record) in state.subjects.iter_mut() {
            if record.completed && !self.is_complete(&record.received) {
                record.completed = false;
                notes.push(format!("reopened base={base} reason=missing-expected-parts"));
            }
        }

        let subjects = &state.subjects;
        state.alerted.retain(|base| {
            let completed = subjects.get(base).is_some_and(|r| r.completed);
            if !completed {
                notes.push(format!("dropped alert mark base={base} reason=not-completed"));
            }
            completed
        });

        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partset::state::SubjectRecord;

    fn sighting(id: &str, base: &str, part: Option<u32>) -> Sighting {
        Sighting {
            message_id: id.to_string(),
            base: base.to_string(),
            part,
        }
    }

    fn received(state: &ProcessState, base: &str) -> Vec<u32> {
        state.subjects[base].received.iter().copied().collect()
    }

    #[test]
    fn accumulates_parts_across_cycles() {
        let tracker = Tracker::default();
        let first = tracker.observe(
            &ProcessState::default(),
            &[
                sighting("m1", "Report", Some(1)),
                sighting("m2", "Report", Some(2)),
            ],
        );
        assert_eq!(received(&first.state, "Report"), vec![1, 2]);
        assert!(!first.state.subjects["Report"].completed);
        assert!(first.newly_completed.is_empty());

        let second = tracker.observe(&first.state, &[sighting("m3", "Report", Some(3))]);
        assert!(second.state.subjects["Report"].completed);
        assert_eq!(
            second.newly_completed,
            BTreeSet::from(["Report".to_string()])
        );
    }

    #[test]
    fn repeated_batch_is_idempotent() {
        let tracker = Tracker::default();
        let batch = [
            sighting("m1", "Report", Some(1)),
            sighting("m2", "Report", Some(2)),
            sighting("m3", "Report", Some(3)),
            sighting("m4", "Lunch", None),
        ];

        let once = tracker.observe(&ProcessState::default(), &batch);
        let twice = tracker.observe(&once.state, &batch);

        assert_eq!(once.state, twice.state);
        assert!(twice.newly_completed.is_empty());
        assert_eq!(twice.stats.duplicates, 4);
        assert_eq!(twice.stats.new_messages, 0);
    }

    #[test]
    fn completion_requires_every_expected_part() {
        let tracker = Tracker::default();
        let out = tracker.observe(
            &ProcessState::default(),
            &[
                sighting("a", "Set", Some(1)),
                sighting("b", "Set", Some(2)),
                sighting("c", "Set", Some(4)),
            ],
        );
        assert!(!out.state.subjects["Set"].completed);
        assert!(out.newly_completed.is_empty());

        let out = tracker.observe(&out.state, &[sighting("d", "Set", Some(3))]);
        assert_eq!(received(&out.state, "Set"), vec![1, 2, 3, 4]);
        assert!(out.state.subjects["Set"].completed);
        assert!(out.newly_completed.contains("Set"));
    }

    #[test]
    fn duplicate_parts_within_a_cycle_collapse() {
        let tracker = Tracker::default();
        let out = tracker.observe(
            &ProcessState::default(),
            &[
                sighting("a", "Set", Some(2)),
                sighting("b", "Set", Some(2)),
                sighting("c", "Other", Some(2)),
            ],
        );
        assert_eq!(received(&out.state, "Set"), vec![2]);
        assert_eq!(received(&out.state, "Other"), vec![2]);
        assert_eq!(out.stats.bases_updated, 2);
    }

    #[test]
    fn seen_message_contributes_nothing() {
        let tracker = Tracker::default();
        let mut prior = ProcessState::default();
        prior.subjects.insert(
            "Report".to_string(),
            SubjectRecord {
                received: BTreeSet::from([1, 2]),
                completed: false,
            },
        );
        prior.processed_ids.insert("m3".to_string());

        let out = tracker.observe(&prior, &[sighting("m3", "Report", Some(3))]);
        assert_eq!(received(&out.state, "Report"), vec![1, 2]);
        assert!(!out.state.subjects["Report"].completed);
        assert!(out.newly_completed.is_empty());
        assert_eq!(out.stats.duplicates, 1);
    }

    #[test]
    fn same_id_twice_in_one_batch_counts_once() {
        let tracker = Tracker::default();
        let out = tracker.observe(
            &ProcessState::default(),
            &[sighting("m1", "Report", Some(1)), sighting("m1", "Report", Some(2))],
        );
        assert_eq!(received(&out.state, "Report"), vec![1]);
        assert_eq!(out.stats.duplicates, 1);
    }

    #[test]
    fn untracked_messages_are_still_recorded() {
        let tracker = Tracker::default();
        let out = tracker.observe(
            &ProcessState::default(),
            &[sighting("noise", "Lunch on Friday?", None)],
        );
        assert!(out.state.processed_ids.contains("noise"));
        assert!(out.state.subjects.is_empty());
        assert_eq!(out.stats.untracked, 1);
    }

    #[test]
    fn closed_base_never_reopens_or_realerts() {
        let tracker = Tracker::default();
        let done = tracker.observe(
            &ProcessState::default(),
            &[
                sighting("a", "Report", Some(1)),
                sighting("b", "Report", Some(2)),
                sighting("c", "Report", Some(3)),
            ],
        );
        let mut state = done.state;
        assert!(state.mark_alerted("Report"));

        let late = tracker.observe(
            &state,
            &[sighting("d", "Report", Some(7)), sighting("e", "Report", Some(1))],
        );
        assert_eq!(received(&late.state, "Report"), vec![1, 2, 3]);
        assert!(late.newly_completed.is_empty());
        assert_eq!(late.stats.closed_bases, 1);
        assert!(late.state.processed_ids.contains("d"));
    }

    #[test]
    fn completion_without_alert_mark_is_reported_again_after_restart() {
        let tracker = Tracker::default();
        let batch = [
            sighting("a", "Report", Some(1)),
            sighting("b", "Report", Some(2)),
            sighting("c", "Report", Some(3)),
        ];

        // The cycle that detected completion never persisted; the next one
        // starts from the same prior state and must detect it again.
        let prior = ProcessState::default();
        let first = tracker.observe(&prior, &batch);
        let replay = tracker.observe(&prior, &batch);
        assert_eq!(first.newly_completed, replay.newly_completed);
        assert!(replay.newly_completed.contains("Report"));
    }

    #[test]
    fn already_alerted_base_is_not_reported() {
        let tracker = Tracker::default();
        let mut prior = ProcessState::default();
        prior.subjects.insert(
            "Report".to_string(),
            SubjectRecord {
                received: BTreeSet::from([1, 2]),
                completed: false,
            },
        );
        prior.alerted.insert("Report".to_string());

        let out = tracker.observe(&prior, &[sighting("c", "Report", Some(3))]);
        assert!(out.state.subjects["Report"].completed);
        assert!(out.newly_completed.is_empty());
    }

    #[test]
    fn base_reaches_newly_completed_at_most_once() {
        let tracker = Tracker::default();
        let cycles = [
            vec![sighting("1", "Set", Some(1))],
            vec![sighting("2", "Set", Some(2)), sighting("1", "Set", Some(1))],
            vec![sighting("3", "Set", Some(3))],
            vec![sighting("4", "Set", Some(3)), sighting("5", "Set", Some(2))],
            vec![sighting("3", "Set", Some(3))],
        ];

        let mut state = ProcessState::default();
        let mut alerts = 0;
        for batch in &cycles {
            let out = tracker.observe(&state, batch);
            state = out.state;
            for base in &out.newly_completed {
                alerts += 1;
                assert!(state.mark_alerted(base));
            }
        }
        assert_eq!(alerts, 1);
    }

    #[test]
    fn repair_restores_invariants() {
        let tracker = Tracker::default();
        let mut state = ProcessState::default();
        state.subjects.insert(
            "Broken".to_string(),
            SubjectRecord {
                received: BTreeSet::from([1, 3]),
                completed: true,
            },
        );
        state.subjects.insert(
            "Fine".to_string(),
            SubjectRecord {
                received: BTreeSet::from([1, 2, 3]),
                completed: true,
            },
        );
        state.alerted.insert("Broken".to_string());
        state.alerted.insert("Fine".to_string());
        state.alerted.insert("Ghost".to_string());

        let notes = tracker.repair(&mut state);
        assert_eq!(notes.len(), 3);
        assert!(!state.subjects["Broken"].completed);
        assert_eq!(state.alerted, BTreeSet::from(["Fine".to_string()]));
        assert!(tracker.repair(&mut state).is_empty());
    }
}
