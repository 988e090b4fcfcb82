use crate::error::PartwatchError;
use crate::mail::{Mailbox, RawMessage};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mailparse::MailHeaderMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Files are pre-filtered on mtime with a day of slack, the same coarseness
/// as an IMAP `SINCE` search; the driver applies the exact window.
const SINCE_SLACK_SECS: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct MaildirMailbox {
    root: PathBuf,
}

impl MaildirMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Maildir unique name: the file name up to the `:2,FLAGS` info suffix, so a
/// message keeps its identity when moved from `new/` to `cur/`.
fn unique_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let unique = name.split(':').next().unwrap_or(name);
    if unique.is_empty() {
        return None;
    }
    Some(unique.to_string())
}

fn cutoff_time(since: DateTime<Utc>) -> SystemTime {
    let secs = since.timestamp().saturating_sub(SINCE_SLACK_SECS).max(0);
    UNIX_EPOCH + Duration::from_secs(secs as u64)
}

fn collect_candidates(dir: &Path, cutoff: SystemTime, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        if modified < cutoff {
            continue;
        }
        out.push(path);
    }
    Ok(())
}

fn read_message(path: &Path) -> Result<RawMessage> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let fallback_id = unique_name(path)
        .with_context(|| format!("maildir file has no usable name: {}", path.display()))?;

    let (subject, date, message_id) = match mailparse::parse_headers(&bytes) {
        Ok((headers, _)) => (
            headers.get_first_value("Subject"),
            headers.get_first_value("Date"),
            headers
                .get_first_value("Message-ID")
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        ),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "unparseable header block");
            (None, None, None)
        }
    };

    Ok(RawMessage {
        id: message_id.unwrap_or(fallback_id),
        subject,
        date,
    })
}

impl Mailbox for MaildirMailbox {
    fn describe(&self) -> String {
        format!("maildir:{}", self.root.display())
    }

    fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawMessage>> {
        if !self.root.is_dir() {
            return Err(PartwatchError::MailboxUnavailable(format!(
                "maildir not found: {}",
                self.root.display()
            ))
            .into());
        }

        let cutoff = cutoff_time(since);
        let mut files = Vec::new();
        for sub in ["new", "cur"] {
            let dir = self.root.join(sub);
            if dir.is_dir() {
                collect_candidates(&dir, cutoff, &mut files)?;
            }
        }
        files.sort();

        let mut out = Vec::with_capacity(files.len());
        for file in files {
            match read_message(&file) {
                Ok(message) => out.push(message),
                Err(err) => {
                    warn!(path = %file.display(), error = %format!("{err:#}"), "skipping unreadable message");
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, code_of};
    use tempfile::tempdir;

    fn maildir(root: &Path) {
        for sub in ["new", "cur", "tmp"] {
            fs::create_dir_all(root.join(sub)).expect("mkdir maildir");
        }
    }

    #[test]
    fn reads_headers_from_new_and_cur() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path().join("Maildir");
        maildir(&root);
        fs::write(
            root.join("new/1700000000.1.host"),
            "Message-ID: <one@example.test>\r\nSubject: 1, Report\r\nDate: Mon, 2 Mar 2026 10:00:00 +0000\r\n\r\nbody\r\n",
        )
        .expect("write new");
        fs::write(
            root.join("cur/1700000001.2.host:2,S"),
            "Subject: Report - 2\n\nbody\n",
        )
        .expect("write cur");
        fs::write(root.join("tmp/1700000002.3.host"), "Subject: 3 Report\n\n").expect("write tmp");

        let messages = MaildirMailbox::new(&root)
            .fetch_since(Utc::now())
            .expect("fetch");

        assert_eq!(messages.len(), 2);
        let ids = messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert!(ids.contains(&"<one@example.test>"));
        assert!(ids.contains(&"1700000001.2.host"));
        let from_cur = messages
            .iter()
            .find(|m| m.id == "1700000001.2.host")
            .expect("cur message");
        assert_eq!(from_cur.subject.as_deref(), Some("Report - 2"));
        assert_eq!(from_cur.date, None);
    }

    #[test]
    fn decodes_encoded_word_subjects() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path().join("Maildir");
        maildir(&root);
        fs::write(
            root.join("new/1700000000.9.host"),
            "Subject: =?UTF-8?B?KDIpIFJlw6d1?=\n\nbody\n",
        )
        .expect("write");

        let messages = MaildirMailbox::new(&root)
            .fetch_since(Utc::now())
            .expect("fetch");
        assert_eq!(messages[0].subject.as_deref(), Some("(2) Reçu"));
    }

    #[test]
    fn skips_dotfiles() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path().join("Maildir");
        maildir(&root);
        fs::write(root.join("new/.partial"), "Subject: 1 x\n\n").expect("write");

        let messages = MaildirMailbox::new(&root)
            .fetch_since(Utc::now())
            .expect("fetch");
        assert!(messages.is_empty());
    }

    #[test]
    fn missing_maildir_is_mailbox_unavailable() {
        let tmp = tempdir().expect("tempdir");
        let err = MaildirMailbox::new(tmp.path().join("absent"))
            .fetch_since(Utc::now())
            .expect_err("missing maildir");
        assert_eq!(code_of(&err), Some(ErrorCode::E003MailboxUnavailable));
    }

    #[test]
    fn unique_name_strips_info_suffix() {
        assert_eq!(
            unique_name(Path::new("/m/cur/123.456.host:2,RS")),
            Some("123.456.host".to_string())
        );
        assert_eq!(
            unique_name(Path::new("/m/new/123.456.host")),
            Some("123.456.host".to_string())
        );
    }

    #[test]
    fn cutoff_applies_a_day_of_slack() {
        let since = DateTime::<Utc>::from_timestamp(200_000, 0).expect("ts");
        assert_eq!(
            cutoff_time(since),
            UNIX_EPOCH + Duration::from_secs(200_000 - 86_400)
        );
        let early = DateTime::<Utc>::from_timestamp(10, 0).expect("ts");
        assert_eq!(cutoff_time(early), UNIX_EPOCH);
    }
}
