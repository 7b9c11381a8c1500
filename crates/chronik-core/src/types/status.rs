use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    /// Schema matches expectation
    Ok,
    /// Schema missing or divergent
    SetupRequired,
    /// Backend unreachable
    Error,
}

/// Operator-facing health of a storage table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusType,
    pub details: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            kind: StatusType::Ok,
            details: String::new(),
        }
    }

    pub fn setup_required(details: impl Into<String>) -> Self {
        Self {
            kind: StatusType::SetupRequired,
            details: details.into(),
        }
    }

    pub fn error(details: impl Into<String>) -> Self {
        Self {
            kind: StatusType::Error,
            details: details.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == StatusType::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            StatusType::Ok => "ok",
            StatusType::SetupRequired => "setup required",
            StatusType::Error => "error",
        };
        if self.details.is_empty() {
            f.write_str(label)
        } else {
            write!(f, "{}: {}", label, self.details)
        }
    }
}
