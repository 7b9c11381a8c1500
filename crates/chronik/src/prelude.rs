//! Chronik Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use chronik::prelude::*;
//! ```

// Core types
pub use crate::{
    ChronikDb, ChronikError, CommitResult, Event, EventData, EventEnvelope, EventId,
    EventMetadata, EventType, Events, ExpectedVersion, Result, SequenceNumber, Status,
    StatusType, StreamName, Version,
};

// Reads
pub use crate::{CorrelationId, EventStreamFilter, StreamSelector, VirtualStreamName};

// Configs
pub use crate::{
    CheckpointConfig, ChronikConfig, EventStoreConfig, RetryPolicy, SessionConfig,
    SynchronousMode,
};

// Traits
pub use crate::{CheckpointStorage, Clock, EventStore, EventStream};

// Implementations
pub use crate::{SqliteCheckpointStorage, SqliteEventStore, SqliteEventStream, SystemClock};

// Subscriptions
pub use crate::{CatchUpStats, CatchUpSubscriber};

// Re-export common external deps
pub use anyhow;
pub use serde::{Deserialize, Serialize};
pub use std::sync::Arc;
pub use tracing;
