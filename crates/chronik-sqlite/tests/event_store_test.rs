//! Commit semantics of the SQLite event store

use chrono::{TimeZone, Utc};
use chronik_core::{
    CausationId, ChronikError, CorrelationId, Event, EventData, EventId, EventMetadata,
    EventStore, EventStoreConfig, EventStream, EventType, Events, ExpectedVersion, FixedClock,
    SequenceNumber, SessionConfig, StreamName, SystemClock, Version,
};
use chronik_sqlite::{Session, SqliteEventStore};
use std::path::Path;
use std::sync::Arc;

fn open_store(dir: &Path) -> SqliteEventStore {
    let session = Session::open(SessionConfig::new(dir.join("events.db"))).unwrap();
    let store =
        SqliteEventStore::new(session, EventStoreConfig::default(), Arc::new(SystemClock)).unwrap();
    store.setup().unwrap();
    store
}

fn event(event_type: &str, payload: &str) -> Event {
    Event::new(
        EventId::create(),
        EventType::new(event_type).unwrap(),
        EventData::new(payload),
    )
}

fn stream(name: &str) -> StreamName {
    StreamName::new(name).unwrap()
}

#[test]
fn test_batch_gets_contiguous_versions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    let batch = Events::new(vec![
        event("Created", "{}"),
        event("Renamed", r#"{"name":"a"}"#),
        event("Renamed", r#"{"name":"b"}"#),
        event("Closed", "{}"),
    ])
    .unwrap();
    let result = store
        .commit(&stream("order-1"), batch, ExpectedVersion::NoStream)
        .unwrap();
    assert_eq!(result.version, Version::new(3));
    assert_eq!(result.sequence_number, SequenceNumber::new(4));

    let envelopes: Vec<_> = store
        .load(&stream("order-1"), None)
        .iter()
        .collect::<Result<_, _>>()
        .unwrap();
    let versions: Vec<u64> = envelopes.iter().map(|e| e.version.value()).collect();
    assert_eq!(versions, vec![0, 1, 2, 3]);
    assert!(envelopes
        .windows(2)
        .all(|w| w[0].sequence_number < w[1].sequence_number));
}

#[test]
fn test_expected_version_end_to_end() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());
    let order = stream("order-1");

    let abc = Events::new(vec![event("A", "{}"), event("B", "{}"), event("C", "{}")]).unwrap();
    let first = store.commit(&order, abc, ExpectedVersion::NoStream).unwrap();
    assert_eq!(first.version, Version::new(2));

    let second = store
        .commit(&order, event("D", "{}"), ExpectedVersion::Exact(Version::new(2)))
        .unwrap();
    assert_eq!(second.version, Version::new(3));

    let err = store
        .commit(&order, event("E", "{}"), ExpectedVersion::Exact(Version::new(2)))
        .unwrap_err();
    assert!(err.is_concurrency());
    assert!(err.to_string().contains("Expected version: 2, actual version: 3"));

    let err = store
        .commit(&order, event("F", "{}"), ExpectedVersion::NoStream)
        .unwrap_err();
    assert!(err.is_concurrency());

    assert_eq!(store.stream_version(&order).unwrap(), Some(Version::new(3)));
    assert_eq!(store.head().unwrap(), SequenceNumber::new(4));
}

#[test]
fn test_exact_version_on_missing_stream_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    let err = store
        .commit(
            &stream("order-9"),
            event("A", "{}"),
            ExpectedVersion::Exact(Version::FIRST),
        )
        .unwrap_err();
    assert!(err.is_concurrency());
    assert_eq!(store.stream_version(&stream("order-9")).unwrap(), None);
    assert_eq!(store.head().unwrap(), SequenceNumber::NONE);
}

#[test]
fn test_envelope_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let session = Session::open(SessionConfig::new(temp_dir.path().join("events.db"))).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap();
    let store = SqliteEventStore::new(
        session,
        EventStoreConfig::default(),
        Arc::new(FixedClock::new(at)),
    )
    .unwrap();
    store.setup().unwrap();

    let original = event("Shipped", r#"{"carrier":"dhl"}"#)
        .with_metadata(EventMetadata::new().with("user", "alice"))
        .with_causation_id(CausationId::new("cmd-1").unwrap())
        .with_correlation_id(CorrelationId::new("saga-7").unwrap());
    store
        .commit(&stream("order-1"), original.clone(), ExpectedVersion::Any)
        .unwrap();

    let envelope = store
        .load(&stream("order-1"), None)
        .iter()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(envelope.event, original);
    assert_eq!(envelope.stream_name, stream("order-1"));
    assert_eq!(envelope.version, Version::FIRST);
    assert_eq!(envelope.sequence_number, SequenceNumber::new(1));
    assert_eq!(envelope.recorded_at, at);
}

#[test]
fn test_open_transaction_on_session_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    store.session().execute_batch("BEGIN").unwrap();
    let err = store
        .commit(&stream("order-1"), event("A", "{}"), ExpectedVersion::Any)
        .unwrap_err();
    assert!(err.is_configuration());
    store.session().execute_batch("ROLLBACK").unwrap();

    store
        .commit(&stream("order-1"), event("A", "{}"), ExpectedVersion::Any)
        .unwrap();
}

#[test]
fn test_duplicate_event_id_is_a_storage_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    let first = event("A", "{}");
    let duplicate = Event::new(first.id.clone(), EventType::new("B").unwrap(), "{}".into());
    store
        .commit(&stream("order-1"), first, ExpectedVersion::Any)
        .unwrap();

    let err = store
        .commit(&stream("order-2"), duplicate, ExpectedVersion::Any)
        .unwrap_err();
    assert!(matches!(err, ChronikError::Storage(_)));
    assert_eq!(store.stream_version(&stream("order-2")).unwrap(), None);
}

#[test]
fn test_failed_batch_leaves_no_rows() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    let taken = event("A", "{}");
    store
        .commit(&stream("order-1"), taken.clone(), ExpectedVersion::Any)
        .unwrap();

    // Second event of the batch collides on id, so the first must not survive
    let batch = Events::new(vec![event("B", "{}"), taken]).unwrap();
    assert!(store
        .commit(&stream("order-2"), batch, ExpectedVersion::NoStream)
        .is_err());
    assert_eq!(store.load(&stream("order-2"), None).iter().count(), 0);
    assert_eq!(store.head().unwrap(), SequenceNumber::new(1));
}

#[test]
fn test_commit_reconnects_after_connection_loss() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    store
        .commit(&stream("order-1"), event("A", "{}"), ExpectedVersion::NoStream)
        .unwrap();
    store.session().close();

    let result = store
        .commit(
            &stream("order-1"),
            event("B", "{}"),
            ExpectedVersion::Exact(Version::FIRST),
        )
        .unwrap();
    assert_eq!(result.version, Version::new(1));
}

#[test]
fn test_delete_stream() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = open_store(temp_dir.path());

    let two = Events::new(vec![event("A", "{}"), event("B", "{}")]).unwrap();
    store
        .commit(&stream("order-1"), two, ExpectedVersion::NoStream)
        .unwrap();
    store
        .commit(&stream("order-2"), event("A", "{}"), ExpectedVersion::NoStream)
        .unwrap();

    assert_eq!(store.delete_stream(&stream("order-1")).unwrap(), 2);
    assert_eq!(store.delete_stream(&stream("order-1")).unwrap(), 0);
    assert_eq!(store.stream_version(&stream("order-1")).unwrap(), None);
    assert_eq!(
        store.stream_version(&stream("order-2")).unwrap(),
        Some(Version::FIRST)
    );

    // A deleted stream starts over
    let result = store
        .commit(&stream("order-1"), event("C", "{}"), ExpectedVersion::NoStream)
        .unwrap();
    assert_eq!(result.version, Version::FIRST);
    assert_eq!(result.sequence_number, SequenceNumber::new(4));
}

#[test]
fn test_invalid_table_name_is_rejected() {
    let session = Session::new(SessionConfig::in_memory());
    let err = SqliteEventStore::new(
        session,
        EventStoreConfig::default().with_table_name("events; DROP TABLE x"),
        Arc::new(SystemClock),
    )
    .unwrap_err();
    assert!(err.is_configuration());
}
