use crate::error::{is_version_conflict, map_sqlite_error};
use crate::row::format_timestamp;
use crate::schema::{self, TableSpec};
use crate::session::Session;
use crate::stream::SqliteEventStream;
use chronik_core::{
    ChronikError, Clock, CommitCoordinator, CommitResult, EventStore, EventStoreConfig,
    EventStreamFilter, Events, ExpectedVersion, InsertOutcome, Result, SequenceNumber, Status,
    StreamName, StreamSelector, Version, VersionedLog,
};
use rusqlite::{params, TransactionBehavior};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// SQLite-backed event store
pub struct SqliteEventStore {
    session: Session,
    config: EventStoreConfig,
    clock: Arc<dyn Clock>,
    coordinator: CommitCoordinator,
}

impl SqliteEventStore {
    pub fn new(session: Session, config: EventStoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let coordinator = CommitCoordinator::new(config.retry);
        Ok(Self {
            session,
            config,
            clock,
            coordinator,
        })
    }

    /// Replace the commit coordinator, e.g. to control how retries wait
    pub fn with_coordinator(mut self, coordinator: CommitCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// The session shared by writes and by every reader this store creates
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &EventStoreConfig {
        &self.config
    }

    fn table_spec(&self) -> TableSpec {
        TableSpec::events(&self.config.table_name)
    }

    /// Current version of a stream, `None` if it has no events
    pub fn stream_version(&self, stream: &StreamName) -> Result<Option<Version>> {
        self.session.with_connection(|conn| {
            let version: Option<i64> = conn
                .query_row(
                    &format!(
                        "SELECT MAX(version) FROM {} WHERE stream = ?1",
                        self.config.table_name
                    ),
                    [stream.as_str()],
                    |row| row.get(0),
                )
                .map_err(map_sqlite_error)?;
            Ok(version.map(|v| Version::new(v as u64)))
        })
    }

    /// Highest sequence number in the log
    pub fn head(&self) -> Result<SequenceNumber> {
        self.session.with_connection(|conn| {
            let head: Option<i64> = conn
                .query_row(
                    &format!("SELECT MAX(sequencenumber) FROM {}", self.config.table_name),
                    [],
                    |row| row.get(0),
                )
                .map_err(map_sqlite_error)?;
            Ok(head.map_or(SequenceNumber::NONE, |s| SequenceNumber::new(s as u64)))
        })
    }
}

impl VersionedLog for SqliteEventStore {
    fn ensure_connected(&self) -> Result<()> {
        self.session.ensure_connected()
    }

    fn try_insert_versioned(
        &self,
        stream: &StreamName,
        events: &Events,
        expected_version: ExpectedVersion,
    ) -> Result<InsertOutcome> {
        let table = &self.config.table_name;
        let recorded_at = format_timestamp(self.clock.now());

        self.session.with_connection_mut(|conn| {
            if !conn.is_autocommit() {
                return Err(ChronikError::Configuration(
                    "A transaction is active already, can't commit events".into(),
                ));
            }

            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sqlite_error)?;

            let current: Option<i64> = tx
                .query_row(
                    &format!("SELECT MAX(version) FROM {} WHERE stream = ?1", table),
                    [stream.as_str()],
                    |row| row.get(0),
                )
                .map_err(map_sqlite_error)?;
            let current = current.map(|v| Version::new(v as u64));

            // Dropping `tx` rolls back
            expected_version.verify(current)?;

            let mut version = current.map(Version::next).unwrap_or(Version::FIRST);
            let last_sequence = {
                let mut stmt = tx
                    .prepare_cached(&format!(
                        "INSERT INTO {} (stream, version, type, payload, metadata, id, \
                         causationid, correlationid, recordedat) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        table
                    ))
                    .map_err(map_sqlite_error)?;

                let mut last_sequence = Some(0);
                for (i, event) in events.iter().enumerate() {
                    if i > 0 {
                        version = version.next();
                    }
                    let stored_version = i64::try_from(version.value()).map_err(|_| {
                        ChronikError::InvalidArgument(format!(
                            "Version {} of stream {} is beyond the largest storable version",
                            version, stream
                        ))
                    })?;
                    let inserted = stmt.execute(params![
                        stream.as_str(),
                        stored_version,
                        event.event_type.as_str(),
                        event.data.as_str(),
                        event.metadata.as_ref().map(|m| m.to_json()),
                        event.id.as_str(),
                        event.causation_id.as_ref().map(|c| c.as_str()),
                        event.correlation_id.as_ref().map(|c| c.as_str()),
                        recorded_at,
                    ]);
                    match inserted {
                        Ok(_) => last_sequence = Some(tx.last_insert_rowid()),
                        Err(e) if is_version_conflict(&e, table) => {
                            last_sequence = None;
                            break;
                        }
                        Err(e) => return Err(map_sqlite_error(e)),
                    }
                }
                last_sequence
            };

            match last_sequence {
                Some(sequence) => {
                    tx.commit().map_err(map_sqlite_error)?;
                    Ok(InsertOutcome::Inserted(CommitResult {
                        version,
                        sequence_number: SequenceNumber::new(sequence as u64),
                    }))
                }
                None => {
                    tx.rollback().map_err(map_sqlite_error)?;
                    Ok(InsertOutcome::Conflict)
                }
            }
        })
    }
}

impl EventStore for SqliteEventStore {
    type Stream = SqliteEventStream;

    fn setup(&self) -> Result<()> {
        schema::setup(&self.session, &self.table_spec())
    }

    fn status(&self) -> Status {
        schema::status(&self.session, &self.table_spec())
    }

    fn load(
        &self,
        selector: impl Into<StreamSelector>,
        filter: Option<EventStreamFilter>,
    ) -> SqliteEventStream {
        SqliteEventStream::new(
            self.session.clone(),
            self.config.table_name.clone(),
            self.config.page_size,
            selector.into(),
            filter,
        )
    }

    fn commit(
        &self,
        stream: &StreamName,
        events: impl Into<Events>,
        expected_version: ExpectedVersion,
    ) -> Result<CommitResult> {
        let events = events.into();
        self.coordinator.commit(self, stream, &events, expected_version)
    }

    fn delete_stream(&self, stream: &StreamName) -> Result<u64> {
        let deleted = self.session.with_connection(|conn| {
            conn.execute(
                &format!("DELETE FROM {} WHERE stream = ?1", self.config.table_name),
                [stream.as_str()],
            )
            .map_err(map_sqlite_error)
        })?;
        debug!(stream = %stream, deleted, "Deleted stream");
        Ok(deleted as u64)
    }
}

impl fmt::Debug for SqliteEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEventStore")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
