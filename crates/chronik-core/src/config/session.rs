use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const IN_MEMORY_PATH: &str = ":memory:";

/// Configuration for one storage session (a single database connection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub path: PathBuf,

    /// Enable WAL mode
    /// Default: true
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// SQLite synchronous mode
    #[serde(default)]
    pub synchronous: SynchronousMode,

    /// How long a statement waits for a competing lock before giving up
    /// Default: 5000ms
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// SQLite cache size (in pages, negative = KB)
    /// Default: -64000 (64MB)
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SynchronousMode {
    /// Full fsync (safest, slowest)
    Full,
    /// fsync at critical moments (good balance)
    #[default]
    Normal,
    /// No fsync (fastest, least safe)
    Off,
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_cache_size() -> i32 {
    -64000 // 64MB
}

impl SessionConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: default_wal_mode(),
            synchronous: SynchronousMode::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
            cache_size: default_cache_size(),
        }
    }

    /// A private in-memory database; every connection gets its own
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_PATH).with_wal_mode(false)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty() || self.path == Path::new(IN_MEMORY_PATH)
    }

    pub fn with_synchronous(mut self, synchronous: SynchronousMode) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }

    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    pub fn with_cache_size(mut self, cache_size: i32) -> Self {
        self.cache_size = cache_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: SessionConfig = serde_json::from_str(r#"{"path": "/tmp/events.db"}"#).unwrap();
        assert!(config.wal_mode);
        assert_eq!(config.synchronous, SynchronousMode::Normal);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_in_memory() {
        let config = SessionConfig::in_memory();
        assert!(config.is_in_memory());
        assert!(!config.wal_mode);
    }
}
