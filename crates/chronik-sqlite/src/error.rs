use chronik_core::ChronikError;
use rusqlite::{ffi, ErrorCode};

/// Convert a driver error into the shared taxonomy
///
/// Busy and locked databases surface as concurrency errors, everything else
/// as storage errors.
pub(crate) fn map_sqlite_error(e: rusqlite::Error) -> ChronikError {
    if is_lock_timeout(&e) {
        ChronikError::Concurrency(format!("Lock wait timeout: {}", e))
    } else {
        ChronikError::Storage(e.to_string())
    }
}

/// Like [`map_sqlite_error`], but a column that can't be converted to its
/// Rust type means the stored row is corrupt
pub(crate) fn map_row_error(e: rusqlite::Error) -> ChronikError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            ChronikError::Deserialization(format!("Unreadable stored row: {}", e))
        }
        other => map_sqlite_error(other),
    }
}

pub(crate) fn is_lock_timeout(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// True for a uniqueness violation involving `{table}.version`, i.e. another
/// writer already holds one of the versions this batch tried to claim
pub(crate) fn is_version_conflict(e: &rusqlite::Error, table: &str) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
                && message.contains(&format!("{}.version", table))
        }
        _ => false,
    }
}
