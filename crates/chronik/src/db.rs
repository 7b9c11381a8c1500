//! Unified chronik database interface
//!
//! Keeps the event log and subscriber checkpoints in two SQLite files under
//! one directory. They are separate because a checkpoint lock is a write
//! transaction on its whole database file.

use crate::catchup::CatchUpSubscriber;
use crate::{
    CheckpointConfig, CheckpointStorage, EventStore, EventStoreConfig, Result, SequenceNumber,
    SessionConfig, SqliteCheckpointStorage, SqliteEventStore, Status, StreamSelector,
    SynchronousMode, SystemClock,
};
use chronik_sqlite::schema::{self, TableSpec};
use chronik_sqlite::Session;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const EVENTS_FILE: &str = "events.db";
const CHECKPOINTS_FILE: &str = "checkpoints.db";

/// Settings for everything a [`ChronikDb`] opens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronikConfig {
    #[serde(default)]
    pub events: EventStoreConfig,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,

    #[serde(default)]
    pub sqlite: SqliteOptions,
}

/// Connection settings shared by both database files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteOptions {
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    #[serde(default)]
    pub synchronous: SynchronousMode,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            wal_mode: default_wal_mode(),
            synchronous: SynchronousMode::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl ChronikConfig {
    pub fn with_events(mut self, events: EventStoreConfig) -> Self {
        self.events = events;
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: CheckpointConfig) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    fn session_config(&self, path: PathBuf) -> SessionConfig {
        SessionConfig::new(path)
            .with_wal_mode(self.sqlite.wal_mode)
            .with_synchronous(self.sqlite.synchronous)
            .with_busy_timeout_ms(self.sqlite.busy_timeout_ms)
    }
}

/// Unified chronik database
///
/// Bundles the event store with a factory for per-subscriber checkpoint
/// handles.
pub struct ChronikDb {
    store: SqliteEventStore,
    config: ChronikConfig,
    base_path: PathBuf,
}

impl ChronikDb {
    /// Open a chronik database at the given directory
    ///
    /// Creates:
    /// - `{path}/events.db` - event log
    /// - `{path}/checkpoints.db` - subscriber checkpoints (on first use)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, ChronikConfig::default())
    }

    /// Open with custom configuration
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ChronikConfig) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        let session = Session::open(config.session_config(base_path.join(EVENTS_FILE)))?;
        let store = SqliteEventStore::new(session, config.events.clone(), Arc::new(SystemClock))?;
        config.checkpoints.validate()?;

        Ok(Self {
            store,
            config,
            base_path,
        })
    }

    /// Get reference to the event store
    pub fn store(&self) -> &SqliteEventStore {
        &self.store
    }

    pub fn config(&self) -> &ChronikConfig {
        &self.config
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn checkpoint_session_config(&self) -> SessionConfig {
        self.config.session_config(self.base_path.join(CHECKPOINTS_FILE))
    }

    fn checkpoint_spec(&self) -> TableSpec {
        TableSpec::checkpoints(&self.config.checkpoints.table_name)
    }

    /// Open a checkpoint handle for one subscriber
    ///
    /// Every call opens a new connection, so handles for the same subscriber
    /// exclude each other.
    pub fn checkpoints(&self, subscriber_id: &str) -> Result<SqliteCheckpointStorage> {
        SqliteCheckpointStorage::new(
            self.checkpoint_session_config(),
            self.config.checkpoints.clone(),
            subscriber_id,
        )
    }

    /// Catch-up subscriber reading `selector` on behalf of `subscriber_id`
    pub fn subscriber(
        &self,
        subscriber_id: &str,
        selector: impl Into<StreamSelector>,
    ) -> Result<CatchUpSubscriber<'_, SqliteEventStore, SqliteCheckpointStorage>> {
        Ok(CatchUpSubscriber::new(
            &self.store,
            self.checkpoints(subscriber_id)?,
            selector,
        ))
    }

    /// Create or migrate both the event table and the checkpoint table
    pub fn setup(&self) -> Result<()> {
        self.store.setup()?;
        let session = Session::new(self.checkpoint_session_config());
        schema::setup(&session, &self.checkpoint_spec())?;
        info!(path = %self.base_path.display(), "Database ready");
        Ok(())
    }

    /// Status of the event table
    pub fn status(&self) -> Status {
        self.store.status()
    }

    /// Status of the checkpoint table
    pub fn checkpoint_status(&self) -> Status {
        let session = Session::new(self.checkpoint_session_config());
        schema::status(&session, &self.checkpoint_spec())
    }

    /// Stored position of a subscriber, without taking its lock
    pub fn checkpoint(&self, subscriber_id: &str) -> Result<SequenceNumber> {
        self.checkpoints(subscriber_id)?.applied_sequence_number()
    }
}
