//! Chronik Core: model types and storage contracts for the chronik event store
//!
//! This crate is backend-agnostic. It defines:
//! - Value types: events, streams, versions, sequence numbers, selectors
//! - The error taxonomy shared by every backend
//! - Configuration for sessions, event tables, checkpoints and retries
//! - The optimistic commit protocol ([`CommitCoordinator`]) and its storage seam
//! - Traits implemented by backends: [`EventStore`], [`EventStream`],
//!   [`CheckpointStorage`]
//!
//! Every operation is synchronous and blocking. Concurrency comes from
//! independent callers each holding their own session.

pub mod clock;
pub mod commit;
pub mod config;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use commit::{CommitCoordinator, InsertOutcome, VersionedLog};
pub use config::{
    validate_table_name, CheckpointConfig, EventStoreConfig, RetryPolicy, SessionConfig,
    SynchronousMode,
};
pub use error::{ChronikError, Result};
pub use traits::{CheckpointStorage, EventStore, EventStream};
pub use types::{
    CausationId, CommitResult, CorrelationId, Event, EventData, EventEnvelope, EventId,
    EventMetadata, EventStreamFilter, EventType, Events, ExpectedVersion, MaybeVersion,
    SequenceNumber, Status, StatusType, StreamName, StreamSelector, Version, VirtualStreamName,
};
