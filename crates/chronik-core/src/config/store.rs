use super::retry::RetryPolicy;
use crate::error::{ChronikError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the event store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStoreConfig {
    /// Name of the event table
    /// Default: "events"
    #[serde(default = "default_event_table_name")]
    pub table_name: String,

    /// Rows fetched per round trip while reading
    /// Default: 100
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Backoff schedule for optimistic commit retries
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_event_table_name() -> String {
    "events".to_string()
}

fn default_page_size() -> usize {
    100
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            table_name: default_event_table_name(),
            page_size: default_page_size(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EventStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table_name)?;
        if self.page_size == 0 {
            return Err(ChronikError::Configuration(
                "page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for checkpoint storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Name of the checkpoint table
    /// Default: "checkpoints"
    #[serde(default = "default_checkpoint_table_name")]
    pub table_name: String,

    /// Refuse to move a subscriber's position backwards
    /// Default: false (regressions are allowed for replays, and logged)
    #[serde(default)]
    pub reject_regressions: bool,
}

fn default_checkpoint_table_name() -> String {
    "checkpoints".to_string()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            table_name: default_checkpoint_table_name(),
            reject_regressions: false,
        }
    }
}

impl CheckpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_reject_regressions(mut self, reject_regressions: bool) -> Self {
        self.reject_regressions = reject_regressions;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table_name)
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(ChronikError::Configuration(format!(
            "Invalid table name {:?}: expected [A-Za-z_][A-Za-z0-9_]*",
            name
        )));
    }
    Ok(())
}
