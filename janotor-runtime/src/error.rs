use std::fmt;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

impl ConfigError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "missing required environment variables: {}",
                self.missing.join(", ")
            ));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid settings: {}", self.invalid.join("; ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ConfigError {}

/// Failures that end the current pass. The next scheduled pass starts over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    SourceUnavailable {
        page: u32,
        status: Option<u16>,
        message: String,
    },
    LedgerUnavailable {
        status: Option<u16>,
        message: String,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::SourceUnavailable {
                page,
                status: Some(code),
                message,
            } => write!(f, "source unavailable on page {page}: HTTP {code} {message}"),
            SyncError::SourceUnavailable {
                page,
                status: None,
                message,
            } => write!(f, "source unavailable on page {page}: {message}"),
            SyncError::LedgerUnavailable {
                status: Some(code),
                message,
            } => write!(f, "ledger unavailable: HTTP {code} {message}"),
            SyncError::LedgerUnavailable {
                status: None,
                message,
            } => write!(f, "ledger unavailable: {message}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// A single create or patch that did not go through. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWriteError {
    Transport(String),
    Status { code: u16, body: String },
    /// The spawned write task panicked or was cancelled.
    Task(String),
}

impl fmt::Display for LedgerWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerWriteError::Transport(msg) => write!(f, "transport error: {msg}"),
            LedgerWriteError::Status { code, body } if body.is_empty() => {
                write!(f, "ledger rejected write: HTTP {code}")
            }
            LedgerWriteError::Status { code, body } => {
                write!(f, "ledger rejected write: HTTP {code}: {body}")
            }
            LedgerWriteError::Task(msg) => write!(f, "write task failed: {msg}"),
        }
    }
}

impl std::error::Error for LedgerWriteError {}
