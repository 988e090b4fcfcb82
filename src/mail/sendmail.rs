use crate::mail::{DEFAULT_SENDER, Notifier, compose_alert, parse_address};
use crate::partset::util::run_command_with_input;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lettre::message::Mailbox as MailAddress;
use std::path::{Path, PathBuf};
use std::process::Command;

const DEFAULT_SENDMAIL: &str = "sendmail";

/// Hands the alert to a sendmail-compatible MTA binary (`sendmail -t -oi`).
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    bin: PathBuf,
    envelope_sender: Option<String>,
    from: MailAddress,
    to: MailAddress,
    mailbox_label: String,
    timeout_secs: u64,
}

fn resolve_sendmail_bin(configured: Option<&str>) -> Result<PathBuf> {
    let name = configured.map(str::trim).filter(|s| !s.is_empty());
    if let Some(name) = name {
        let path = Path::new(name);
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return which::which(name)
            .with_context(|| format!("sendmail binary not found: {name}"));
    }
    which::which(DEFAULT_SENDMAIL)
        .context("sendmail binary not found in PARTWATCH_SENDMAIL_BIN or PATH")
}

impl SendmailNotifier {
    pub fn new(
        bin: Option<&str>,
        sender: Option<&str>,
        recipient: &str,
        mailbox_label: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let from = parse_address(sender.unwrap_or(DEFAULT_SENDER), "sender")?;
        Ok(Self {
            bin: resolve_sendmail_bin(bin)?,
            envelope_sender: sender.map(|_| from.email.to_string()),
            from,
            to: parse_address(recipient, "recipient")?,
            mailbox_label,
            timeout_secs,
        })
    }

    fn compose(&self, base: &str, now: DateTime<Utc>) -> Result<Vec<u8>> {
        let message = compose_alert(base, &self.from, &self.to, &self.mailbox_label, now)?;
        Ok(message.formatted())
    }
}

impl Notifier for SendmailNotifier {
    fn describe(&self) -> String {
        format!("sendmail:{} to={}", self.bin.display(), self.to.email)
    }

    fn send_alert(&self, base: &str) -> Result<()> {
        let message = self.compose(base, Utc::now())?;
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-t").arg("-oi");
        if let Some(sender) = &self.envelope_sender {
            cmd.arg("-f").arg(sender);
        }

        let out = run_command_with_input(&mut cmd, &message, Some(self.timeout_secs))
            .with_context(|| format!("failed to run `{}`", self.bin.display()))?;
        if out.status.success() {
            return Ok(());
        }

        anyhow::bail!(
            "sendmail exited with {}\nstderr: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, body).expect("write script");
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod");
    }

    fn notifier(bin: &Path, sender: Option<&str>) -> SendmailNotifier {
        SendmailNotifier::new(
            Some(bin.to_str().expect("utf8 path")),
            sender,
            "ops@example.test",
            "the ops inbox".to_string(),
            5,
        )
        .expect("notifier")
    }

    #[test]
    fn compose_addresses_the_configured_recipient() {
        let tmp = tempdir().expect("tempdir");
        let bin = tmp.path().join("sendmail");
        fs::write(&bin, "").expect("write placeholder");
        let now = Utc
            .with_ymd_and_hms(2026, 3, 2, 12, 0, 0)
            .single()
            .expect("valid timestamp");

        let raw = notifier(&bin, Some("watcher@example.test"))
            .compose("Report", now)
            .expect("compose");
        let raw = String::from_utf8(raw).expect("utf8");
        assert!(raw.contains("From: watcher@example.test\r\n"));
        assert!(raw.contains("To: ops@example.test\r\n"));
        assert!(raw.contains("Subject: [ALERT] Report - Complete Set Received\r\n"));
    }

    #[test]
    fn unset_sender_falls_back_to_local_address() {
        let tmp = tempdir().expect("tempdir");
        let bin = tmp.path().join("sendmail");
        fs::write(&bin, "").expect("write placeholder");

        let notifier = notifier(&bin, None);
        assert_eq!(notifier.envelope_sender, None);
        assert_eq!(notifier.from.email.to_string(), DEFAULT_SENDER);
    }

    #[test]
    fn missing_binary_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let missing = tmp.path().join("no-such-sendmail");
        let err = SendmailNotifier::new(
            Some(missing.to_str().expect("utf8 path")),
            None,
            "ops@example.test",
            "inbox".to_string(),
            5,
        )
        .expect_err("missing binary");
        assert!(format!("{err:#}").contains("sendmail binary not found"));
    }

    #[cfg(unix)]
    #[test]
    fn send_alert_pipes_message_to_binary() {
        let tmp = tempdir().expect("tempdir");
        let bin = tmp.path().join("sendmail");
        let log = tmp.path().join("sent.log");
        write_script(
            &bin,
            &format!(
                "#!/usr/bin/env bash\nprintf '%s\\n' \"$*\" >> '{}'\ncat >> '{}'\n",
                log.display(),
                log.display()
            ),
        );

        notifier(&bin, Some("watcher@example.test"))
            .send_alert("Report")
            .expect("send");

        let sent = fs::read_to_string(&log).expect("read log");
        assert!(sent.starts_with("-t -oi -f watcher@example.test\n"));
        assert!(sent.contains("Subject: [ALERT] Report - Complete Set Received"));
        assert!(sent.contains("received for subject 'Report'"));
    }

    #[cfg(unix)]
    #[test]
    fn send_alert_surfaces_failure_exit() {
        let tmp = tempdir().expect("tempdir");
        let bin = tmp.path().join("sendmail");
        write_script(
            &bin,
            "#!/usr/bin/env bash\ncat >/dev/null\necho 'relay refused' >&2\nexit 75\n",
        );

        let err = notifier(&bin, None)
            .send_alert("Report")
            .expect_err("failure");
        let text = format!("{err:#}");
        assert!(text.contains("relay refused"));
    }
}
