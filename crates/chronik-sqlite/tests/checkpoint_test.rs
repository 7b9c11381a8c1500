//! Locking and persistence of subscriber checkpoints

use chronik_core::{
    CheckpointConfig, CheckpointStorage, ChronikError, SequenceNumber, SessionConfig,
};
use chronik_sqlite::{Session, SqliteCheckpointStorage};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn db_path(dir: &Path) -> PathBuf {
    dir.join("checkpoints.db")
}

fn open(dir: &Path, subscriber: &str) -> SqliteCheckpointStorage {
    open_with(subscriber, SessionConfig::new(db_path(dir)), CheckpointConfig::default())
}

fn open_with(
    subscriber: &str,
    session_config: SessionConfig,
    config: CheckpointConfig,
) -> SqliteCheckpointStorage {
    let storage = SqliteCheckpointStorage::new(session_config, config, subscriber).unwrap();
    storage.setup().unwrap();
    storage
}

#[test]
fn test_in_memory_database_is_rejected() {
    let err = SqliteCheckpointStorage::new(
        SessionConfig::in_memory(),
        CheckpointConfig::default(),
        "projector",
    )
    .err()
    .unwrap();
    assert!(err.is_configuration());
}

#[test]
fn test_invalid_subscriber_id_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::new(db_path(temp_dir.path()));
    let err = SqliteCheckpointStorage::new(config.clone(), CheckpointConfig::default(), "")
        .err()
        .unwrap();
    assert!(matches!(err, ChronikError::InvalidArgument(_)));

    let err = SqliteCheckpointStorage::new(config, CheckpointConfig::default(), "x".repeat(256))
        .err()
        .unwrap();
    assert!(matches!(err, ChronikError::InvalidArgument(_)));
}

#[test]
fn test_position_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    assert_eq!(storage.applied_sequence_number().unwrap(), SequenceNumber::NONE);
    assert_eq!(storage.acquire_lock().unwrap(), SequenceNumber::NONE);
    assert!(storage.is_locked());
    storage
        .update_and_release_lock(SequenceNumber::new(5))
        .unwrap();
    assert!(!storage.is_locked());

    assert_eq!(storage.applied_sequence_number().unwrap(), SequenceNumber::new(5));
    assert_eq!(storage.acquire_lock().unwrap(), SequenceNumber::new(5));
    storage
        .update_and_release_lock(SequenceNumber::new(9))
        .unwrap();

    // Another handle for the same subscriber sees the stored position
    let other = open(temp_dir.path(), "projector");
    assert_eq!(other.applied_sequence_number().unwrap(), SequenceNumber::new(9));

    // Subscribers are independent
    let unrelated = open(temp_dir.path(), "mailer");
    assert_eq!(unrelated.applied_sequence_number().unwrap(), SequenceNumber::NONE);
}

#[test]
fn test_reentrant_acquire_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    storage.acquire_lock().unwrap();
    let err = storage.acquire_lock().unwrap_err();
    assert!(err.is_configuration());

    // The original lock is still intact
    assert!(storage.is_locked());
    storage
        .update_and_release_lock(SequenceNumber::new(1))
        .unwrap();
}

#[test]
fn test_release_without_lock_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    let err = storage
        .update_and_release_lock(SequenceNumber::new(3))
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(storage.applied_sequence_number().unwrap(), SequenceNumber::NONE);
}

#[test]
fn test_unchanged_position_skips_update_but_releases_lock() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    let audit = Session::open(SessionConfig::new(db_path(temp_dir.path()))).unwrap();
    audit
        .execute_batch(
            "CREATE TABLE audit (position INTEGER NOT NULL);
             CREATE TRIGGER checkpoints_audit AFTER UPDATE ON checkpoints
             BEGIN
                 INSERT INTO audit (position) VALUES (NEW.appliedsequencenumber);
             END;",
        )
        .unwrap();
    let audited = || -> i64 {
        audit
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM audit", [], |row| row.get(0))
                    .map_err(|e| ChronikError::Storage(e.to_string()))
            })
            .unwrap()
    };

    let position = storage.acquire_lock().unwrap();
    storage.update_and_release_lock(position).unwrap();
    assert_eq!(audited(), 0);

    // A second handle gets the lock without waiting
    let mut other = open_with(
        "projector",
        SessionConfig::new(db_path(temp_dir.path())).with_busy_timeout_ms(50),
        CheckpointConfig::default(),
    );
    assert_eq!(other.acquire_lock().unwrap(), SequenceNumber::NONE);
    other
        .update_and_release_lock(SequenceNumber::new(4))
        .unwrap();
    assert_eq!(audited(), 1);
}

#[test]
fn test_lock_excludes_other_handles_until_released() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut holder = open(temp_dir.path(), "projector");
    let mut impatient = open_with(
        "projector",
        SessionConfig::new(db_path(temp_dir.path())).with_busy_timeout_ms(100),
        CheckpointConfig::default(),
    );

    holder.acquire_lock().unwrap();
    let err = impatient.acquire_lock().unwrap_err();
    assert!(err.is_concurrency());
    assert!(!impatient.is_locked());

    holder
        .update_and_release_lock(SequenceNumber::new(7))
        .unwrap();
    assert_eq!(impatient.acquire_lock().unwrap(), SequenceNumber::new(7));
    impatient
        .update_and_release_lock(SequenceNumber::new(8))
        .unwrap();
}

#[test]
fn test_waiting_handle_sees_released_position() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().to_path_buf();
    let mut holder = open(&dir, "projector");

    let barrier = Arc::new(Barrier::new(2));
    let (tx, rx) = mpsc::channel();
    let waiter = {
        let barrier = Arc::clone(&barrier);
        let dir = dir.clone();
        thread::spawn(move || {
            let mut storage = open(&dir, "projector");
            // Opened; wait for the holder to take the lock
            barrier.wait();
            barrier.wait();
            let started = Instant::now();
            let position = storage.acquire_lock().unwrap();
            tx.send((position, started.elapsed())).unwrap();
            storage
                .update_and_release_lock(position.next())
                .unwrap();
        })
    };

    barrier.wait();
    holder.acquire_lock().unwrap();
    barrier.wait();
    thread::sleep(Duration::from_millis(200));
    assert!(rx.try_recv().is_err());
    holder
        .update_and_release_lock(SequenceNumber::new(42))
        .unwrap();

    let (position, waited) = rx.recv().unwrap();
    waiter.join().unwrap();
    assert_eq!(position, SequenceNumber::new(42));
    assert!(waited >= Duration::from_millis(100));
    assert_eq!(holder.applied_sequence_number().unwrap(), SequenceNumber::new(43));
}

#[test]
fn test_drop_releases_lock() {
    let temp_dir = tempfile::tempdir().unwrap();
    {
        let mut storage = open(temp_dir.path(), "projector");
        storage.acquire_lock().unwrap();
    }

    let mut other = open_with(
        "projector",
        SessionConfig::new(db_path(temp_dir.path())).with_busy_timeout_ms(50),
        CheckpointConfig::default(),
    );
    assert_eq!(other.acquire_lock().unwrap(), SequenceNumber::NONE);
    other
        .update_and_release_lock(SequenceNumber::NONE)
        .unwrap();
}

#[test]
fn test_regression_allowed_by_default() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    storage.acquire_lock().unwrap();
    storage
        .update_and_release_lock(SequenceNumber::new(10))
        .unwrap();
    storage.acquire_lock().unwrap();
    storage
        .update_and_release_lock(SequenceNumber::new(3))
        .unwrap();
    assert_eq!(storage.applied_sequence_number().unwrap(), SequenceNumber::new(3));
}

#[test]
fn test_rejected_regression_releases_lock() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open_with(
        "projector",
        SessionConfig::new(db_path(temp_dir.path())),
        CheckpointConfig::default().with_reject_regressions(true),
    );

    storage.acquire_lock().unwrap();
    storage
        .update_and_release_lock(SequenceNumber::new(10))
        .unwrap();
    storage.acquire_lock().unwrap();
    let err = storage
        .update_and_release_lock(SequenceNumber::new(3))
        .unwrap_err();
    assert!(matches!(err, ChronikError::Checkpoint(_)));
    assert!(!storage.is_locked());
    assert_eq!(storage.applied_sequence_number().unwrap(), SequenceNumber::new(10));

    // Nothing is left locked
    assert_eq!(storage.acquire_lock().unwrap(), SequenceNumber::new(10));
    storage
        .update_and_release_lock(SequenceNumber::new(11))
        .unwrap();
}

#[test]
fn test_with_lock_keeps_position_on_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    let stored = storage
        .with_lock(|current| Ok(SequenceNumber::new(current.value() + 5)))
        .unwrap();
    assert_eq!(stored, SequenceNumber::new(5));

    let err = storage
        .with_lock(|_| Err(ChronikError::InvalidArgument("handler failed".into())))
        .unwrap_err();
    assert!(matches!(err, ChronikError::InvalidArgument(_)));
    assert!(!storage.is_locked());
    assert_eq!(storage.applied_sequence_number().unwrap(), SequenceNumber::new(5));
}

#[test]
fn test_status_and_setup() {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = SqliteCheckpointStorage::new(
        SessionConfig::new(db_path(temp_dir.path())),
        CheckpointConfig::default().with_table_name("subscriber_positions"),
        "projector",
    )
    .unwrap();

    let status = storage.status();
    assert!(!status.is_ok());
    assert!(status.details.contains("CREATE TABLE subscriber_positions"));

    storage.setup().unwrap();
    storage.setup().unwrap();
    assert!(storage.status().is_ok());
}

#[test]
fn test_unstorable_position_is_rejected_and_releases_lock() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut storage = open(temp_dir.path(), "projector");

    storage.acquire_lock().unwrap();
    storage
        .update_and_release_lock(SequenceNumber::new(7))
        .unwrap();

    storage.acquire_lock().unwrap();
    let err = storage
        .update_and_release_lock(SequenceNumber::new(u64::MAX))
        .unwrap_err();
    assert!(matches!(err, ChronikError::InvalidArgument(_)));
    assert!(!storage.is_locked());

    // Position untouched and the subscriber can carry on
    assert_eq!(storage.acquire_lock().unwrap(), SequenceNumber::new(7));
    storage
        .update_and_release_lock(SequenceNumber::new(i64::MAX as u64))
        .unwrap();
    assert_eq!(
        storage.applied_sequence_number().unwrap(),
        SequenceNumber::new(i64::MAX as u64)
    );
}
