use crate::types::event::Event;
use crate::types::stream::{SequenceNumber, StreamName, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored event as delivered to readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
    pub stream_name: StreamName,
    pub version: Version,
    pub sequence_number: SequenceNumber,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Version of the last event in the batch
    pub version: Version,

    /// Sequence number assigned to the last event in the batch
    pub sequence_number: SequenceNumber,
}
