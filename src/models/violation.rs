use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    #[serde(rename = "TAB_SWITCH")]
    TabSwitch,
    #[serde(rename = "EXIT_FULLSCREEN")]
    FullscreenExit,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "TAB_SWITCH",
            ViolationKind::FullscreenExit => "EXIT_FULLSCREEN",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Violation,
    Status,
}

/// One line of the on-screen security event log. Violations are persisted
/// only as a count on the attempt; this log is the human-readable trace the
/// session view renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
}

impl SessionLogEntry {
    pub fn violation(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            kind: LogKind::Violation,
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            kind: LogKind::Status,
            message: message.into(),
        }
    }
}
