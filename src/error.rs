use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartwatchError {
    #[error("config invalid: {0}")]
    InvalidConfig(String),
    #[error("mailbox unavailable: {0}")]
    MailboxUnavailable(String),
    #[error("alert dispatch failed for `{base}`: {reason}")]
    AlertDispatch { base: String, reason: String },
    #[error("daemon lock {path} is held by pid {pid}")]
    DaemonLocked { path: String, pid: String },
}

impl PartwatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig(_) => ErrorCode::E005ConfigInvalid,
            Self::MailboxUnavailable(_) => ErrorCode::E003MailboxUnavailable,
            Self::AlertDispatch { .. } => ErrorCode::E004AlertFailed,
            Self::DaemonLocked { .. } => ErrorCode::E001Locked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E001Locked,
    E002StateCorrupt,
    E003MailboxUnavailable,
    E004AlertFailed,
    E005ConfigInvalid,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Locked => "E001_LOCKED",
            Self::E002StateCorrupt => "E002_STATE_CORRUPT",
            Self::E003MailboxUnavailable => "E003_MAILBOX_UNAVAILABLE",
            Self::E004AlertFailed => "E004_ALERT_FAILED",
            Self::E005ConfigInvalid => "E005_CONFIG_INVALID",
        }
    }
}

/// Stable code for an error chain, when it carries a classified failure.
pub fn code_of(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PartwatchError>())
        .map(PartwatchError::code)
}
