//! Chronik: an append-only event store on SQLite
//!
//! Chronik provides:
//! - **Event log**: totally ordered, immutable events partitioned into streams
//! - **Optimistic commits**: expected-version checks with automatic retry on
//!   version collisions
//! - **Stream readers**: restartable, paginated reads over single streams,
//!   categories, correlation ids or the whole log
//! - **Checkpoints**: durable, lock-protected positions for subscribers
//! - **Catch-up subscriptions**: read, handle and acknowledge in one call
//!
//! # Quick Start
//!
//! ```no_run
//! use chronik::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let db = ChronikDb::open("./data")?;
//! db.setup()?;
//!
//! let stream = StreamName::new("order-1")?;
//! let event = Event::new(
//!     EventId::create(),
//!     EventType::new("OrderPlaced")?,
//!     EventData::new(r#"{"total":42}"#),
//! );
//! db.store().commit(&stream, event, ExpectedVersion::NoStream)?;
//!
//! for envelope in db.store().load(&stream, None).iter() {
//!     let envelope = envelope?;
//!     println!("{} {}", envelope.version, envelope.event.event_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catchup;
pub mod db;
pub mod prelude;

// Re-export core types
pub use chronik_core::{
    clock::{Clock, FixedClock, SystemClock},
    commit::{CommitCoordinator, InsertOutcome, VersionedLog},
    config::{CheckpointConfig, EventStoreConfig, RetryPolicy, SessionConfig, SynchronousMode},
    error::{ChronikError, Result},
    observe,
    traits::{CheckpointStorage, EventStore, EventStream},
    types::{
        CausationId, CommitResult, CorrelationId, Event, EventData, EventEnvelope, EventId,
        EventMetadata, EventStreamFilter, EventType, Events, ExpectedVersion, MaybeVersion,
        SequenceNumber, Status, StatusType, StreamName, StreamSelector, Version,
        VirtualStreamName,
    },
};

// Re-export implementations
pub use chronik_sqlite::{
    Session, SqliteCheckpointStorage, SqliteEventIter, SqliteEventStore, SqliteEventStream,
};

// Re-export main types from this crate
pub use catchup::{CatchUpStats, CatchUpSubscriber};
pub use db::{ChronikConfig, ChronikDb};
