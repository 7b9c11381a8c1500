use crate::error::map_sqlite_error;
use chronik_core::config::SynchronousMode;
use chronik_core::{ChronikError, Result, SessionConfig};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

struct SessionState {
    conn: Option<Connection>,
    config: SessionConfig,
}

/// A single SQLite connection shared by the handles cloned from it
///
/// The connection is opened on first use. [`Session::ensure_connected`] pings
/// it and transparently re-opens it if the ping fails. All access is
/// serialized through a mutex, so one session runs one statement at a time.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    /// Create a session without connecting yet
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState { conn: None, config })),
        }
    }

    /// Create a session and connect immediately
    pub fn open(config: SessionConfig) -> Result<Self> {
        let session = Self::new(config);
        session.ensure_connected()?;
        Ok(session)
    }

    pub fn config(&self) -> SessionConfig {
        self.state.lock().config.clone()
    }

    /// Verify the connection is alive, re-opening it if needed
    pub fn ensure_connected(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(conn) = state.conn.as_ref() {
            match conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(path = %state.config.path.display(), "Connection lost, reconnecting: {}", e);
                    state.conn = None;
                }
            }
        }
        let conn = open_connection(&state.config)?;
        state.conn = Some(conn);
        Ok(())
    }

    /// Run `f` against the connection, opening it first if needed
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut state = self.state.lock();
        f(connection(&mut state)?)
    }

    /// Like [`Session::with_connection`], for APIs that need exclusive access
    pub fn with_connection_mut<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut state = self.state.lock();
        f(connection(&mut state)?)
    }

    /// Whether a transaction is currently open on this session
    pub fn in_transaction(&self) -> Result<bool> {
        self.with_connection(|conn| Ok(!conn.is_autocommit()))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_connection(|conn| conn.execute_batch(sql).map_err(map_sqlite_error))
    }

    /// Drop the connection; the next use opens a new one
    ///
    /// An open transaction is rolled back by SQLite.
    pub fn close(&self) {
        if self.state.lock().conn.take().is_some() {
            debug!("Session closed");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("path", &state.config.path)
            .field("connected", &state.conn.is_some())
            .finish()
    }
}

fn connection(state: &mut SessionState) -> Result<&mut Connection> {
    if state.conn.is_none() {
        state.conn = Some(open_connection(&state.config)?);
    }
    state
        .conn
        .as_mut()
        .ok_or_else(|| ChronikError::Storage("Connection unavailable".into()))
}

fn open_connection(config: &SessionConfig) -> Result<Connection> {
    let conn = if config.is_in_memory() {
        Connection::open_in_memory()
    } else {
        Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }
    .map_err(|e| {
        ChronikError::Storage(format!(
            "Failed to open {}: {}",
            config.path.display(),
            e
        ))
    })?;

    configure_connection(&conn, config)?;
    debug!(path = %config.path.display(), "Opened connection");
    Ok(conn)
}

fn configure_connection(conn: &Connection, config: &SessionConfig) -> Result<()> {
    if config.wal_mode && !config.is_in_memory() {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| ChronikError::Configuration(e.to_string()))?;
    }

    let sync_mode = match config.synchronous {
        SynchronousMode::Full => "FULL",
        SynchronousMode::Normal => "NORMAL",
        SynchronousMode::Off => "OFF",
    };
    conn.pragma_update(None, "synchronous", sync_mode)
        .map_err(|e| ChronikError::Configuration(e.to_string()))?;

    conn.pragma_update(None, "cache_size", config.cache_size)
        .map_err(|e| ChronikError::Configuration(e.to_string()))?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|e| ChronikError::Configuration(e.to_string()))?;

    Ok(())
}
