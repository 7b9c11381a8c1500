use crate::error::map_sqlite_error;
use crate::schema::{self, TableSpec};
use crate::session::Session;
use chronik_core::{
    observe, CheckpointConfig, CheckpointStorage, ChronikError, Result, SequenceNumber,
    SessionConfig, Status,
};
use rusqlite::{Connection, OptionalExtension};
use std::time::Instant;
use tracing::{debug, error, warn};

const MAX_SUBSCRIBER_ID_LENGTH: usize = 255;

/// Checkpoint storage for one subscriber
///
/// The lock is a `BEGIN IMMEDIATE` transaction on a connection owned by this
/// handle. It is held from [`acquire_lock`](CheckpointStorage::acquire_lock)
/// until [`update_and_release_lock`](CheckpointStorage::update_and_release_lock),
/// or until the handle is dropped, which rolls back.
pub struct SqliteCheckpointStorage {
    session: Session,
    config: CheckpointConfig,
    subscriber_id: String,
    /// Position read when the lock was taken; `Some` while the lock is held
    locked_at: Option<SequenceNumber>,
}

impl SqliteCheckpointStorage {
    pub fn new(
        session_config: SessionConfig,
        config: CheckpointConfig,
        subscriber_id: impl Into<String>,
    ) -> Result<Self> {
        if session_config.is_in_memory() {
            return Err(ChronikError::Configuration(
                "Checkpoint storage requires a file-backed database, in-memory SQLite is not supported"
                    .into(),
            ));
        }
        config.validate()?;

        let subscriber_id = subscriber_id.into();
        let length = subscriber_id.chars().count();
        if length == 0 || length > MAX_SUBSCRIBER_ID_LENGTH {
            return Err(ChronikError::InvalidArgument(format!(
                "Subscriber id must have 1 to {} characters, got {:?}",
                MAX_SUBSCRIBER_ID_LENGTH, subscriber_id
            )));
        }

        Ok(Self {
            session: Session::new(session_config),
            config,
            subscriber_id,
            locked_at: None,
        })
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    fn table_spec(&self) -> TableSpec {
        TableSpec::checkpoints(&self.config.table_name)
    }

    fn read_position(&self, conn: &Connection) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            &format!(
                "SELECT appliedsequencenumber FROM {} WHERE subscriberid = ?1",
                self.config.table_name
            ),
            [&self.subscriber_id],
            |row| row.get(0),
        )
        .optional()
    }

    fn to_sequence_number(&self, value: i64) -> Result<SequenceNumber> {
        u64::try_from(value).map(SequenceNumber::new).map_err(|_| {
            ChronikError::Deserialization(format!(
                "Negative checkpoint {} for subscriber {:?}",
                value, self.subscriber_id
            ))
        })
    }

    fn rollback(&self) {
        let result = self.session.with_connection(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK").map_err(map_sqlite_error)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            error!(
                subscriber = %self.subscriber_id,
                "Failed to roll back checkpoint transaction: {}", e
            );
        }
    }
}

impl CheckpointStorage for SqliteCheckpointStorage {
    fn acquire_lock(&mut self) -> Result<SequenceNumber> {
        if self.locked_at.is_some() {
            return Err(ChronikError::Configuration(format!(
                "Checkpoint lock for subscriber {:?} is already held by this handle",
                self.subscriber_id
            )));
        }

        let started = Instant::now();
        self.session.ensure_connected()?;

        let value = self.session.with_connection(|conn| {
            if !conn.is_autocommit() {
                return Err(ChronikError::Configuration(
                    "A transaction is active already, can't acquire checkpoint lock".into(),
                ));
            }

            conn.execute_batch("BEGIN IMMEDIATE TRANSACTION")
                .map_err(|e| match map_sqlite_error(e) {
                    ChronikError::Concurrency(message) => ChronikError::Concurrency(format!(
                        "Timed out waiting for checkpoint lock of subscriber {:?}: {}",
                        self.subscriber_id, message
                    )),
                    other => other,
                })?;

            let read = conn
                .execute(
                    &format!(
                        "INSERT OR IGNORE INTO {} (subscriberid, appliedsequencenumber) VALUES (?1, 0)",
                        self.config.table_name
                    ),
                    [&self.subscriber_id],
                )
                .and_then(|_| self.read_position(conn));

            match read {
                Ok(value) => Ok(value.unwrap_or(0)),
                Err(e) => {
                    if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                        error!("Failed to roll back checkpoint transaction: {}", rollback_err);
                    }
                    Err(ChronikError::Checkpoint(format!(
                        "Failed to acquire checkpoint lock for subscriber {:?}: {}",
                        self.subscriber_id, e
                    )))
                }
            }
        })?;

        let position = match self.to_sequence_number(value) {
            Ok(position) => position,
            Err(e) => {
                self.rollback();
                return Err(e);
            }
        };

        observe::record_lock_wait(started.elapsed());
        self.locked_at = Some(position);
        debug!(
            subscriber = %self.subscriber_id,
            position = %position,
            "Acquired checkpoint lock"
        );
        Ok(position)
    }

    fn update_and_release_lock(&mut self, sequence_number: SequenceNumber) -> Result<()> {
        let locked_at = self.locked_at.ok_or_else(|| {
            ChronikError::Configuration(format!(
                "No checkpoint lock held for subscriber {:?}, acquire it first",
                self.subscriber_id
            ))
        })?;

        let stored = match i64::try_from(sequence_number.value()) {
            Ok(stored) => stored,
            Err(_) => {
                self.locked_at = None;
                self.rollback();
                return Err(ChronikError::InvalidArgument(format!(
                    "Checkpoint {} of subscriber {:?} is beyond the largest storable position {}",
                    sequence_number,
                    self.subscriber_id,
                    i64::MAX
                )));
            }
        };

        let result = self.session.with_connection(|conn| {
            if sequence_number < locked_at {
                if self.config.reject_regressions {
                    return Err(ChronikError::Checkpoint(format!(
                        "Refusing to move checkpoint of subscriber {:?} back from {} to {}",
                        self.subscriber_id, locked_at, sequence_number
                    )));
                }
                warn!(
                    subscriber = %self.subscriber_id,
                    from = %locked_at,
                    to = %sequence_number,
                    "Checkpoint moves backwards"
                );
            }

            if sequence_number != locked_at {
                conn.execute(
                    &format!(
                        "UPDATE {} SET appliedsequencenumber = ?1 WHERE subscriberid = ?2",
                        self.config.table_name
                    ),
                    rusqlite::params![stored, self.subscriber_id],
                )
                .map_err(map_sqlite_error)?;
            }

            conn.execute_batch("COMMIT").map_err(map_sqlite_error)
        });

        self.locked_at = None;

        match result {
            Ok(()) => {
                debug!(
                    subscriber = %self.subscriber_id,
                    position = %sequence_number,
                    "Released checkpoint lock"
                );
                Ok(())
            }
            Err(e) => {
                self.rollback();
                Err(match e {
                    ChronikError::Checkpoint(_) => e,
                    other => ChronikError::Checkpoint(format!(
                        "Failed to update checkpoint of subscriber {:?}: {}",
                        self.subscriber_id, other
                    )),
                })
            }
        }
    }

    fn applied_sequence_number(&self) -> Result<SequenceNumber> {
        let value = self
            .session
            .with_connection(|conn| self.read_position(conn).map_err(map_sqlite_error))?;
        value.map_or(Ok(SequenceNumber::NONE), |v| self.to_sequence_number(v))
    }

    fn setup(&self) -> Result<()> {
        schema::setup(&self.session, &self.table_spec())
    }

    fn status(&self) -> Status {
        schema::status(&self.session, &self.table_spec())
    }
}

impl Drop for SqliteCheckpointStorage {
    fn drop(&mut self) {
        if self.locked_at.take().is_some() {
            warn!(
                subscriber = %self.subscriber_id,
                "Checkpoint handle dropped while holding the lock, rolling back"
            );
            self.rollback();
        }
    }
}
