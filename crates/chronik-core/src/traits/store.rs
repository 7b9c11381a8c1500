use crate::error::Result;
use crate::types::{
    CommitResult, EventEnvelope, EventStreamFilter, Events, ExpectedVersion, SequenceNumber,
    Status, StreamName, StreamSelector,
};

/// A lazily evaluated, restartable query over the event log
///
/// Readers are values: every builder method returns a new reader and leaves
/// the receiver untouched. Each call to [`EventStream::iter`] runs the scan
/// from the beginning, so the same reader can be iterated any number of times.
pub trait EventStream: Clone {
    type Iter<'a>: Iterator<Item = Result<EventEnvelope>>
    where
        Self: 'a;

    /// Only yield envelopes at or after this position (inclusive)
    fn with_minimum_sequence_number(&self, sequence_number: SequenceNumber) -> Self;

    /// Only yield envelopes at or before this position (inclusive)
    fn with_maximum_sequence_number(&self, sequence_number: SequenceNumber) -> Self;

    /// Cap the number of envelopes a single iteration yields
    fn limit(&self, limit: usize) -> Self;

    /// Iterate from the newest position towards the oldest
    fn backwards(&self) -> Self;

    /// Start a fresh scan
    fn iter(&self) -> Self::Iter<'_>;
}

/// Append-only event log with optimistic concurrency on writes
pub trait EventStore: Send + Sync {
    type Stream: EventStream;

    /// Create or migrate the backing schema; running it twice is a no-op
    fn setup(&self) -> Result<()>;

    /// Compare the backing schema against the expected one
    fn status(&self) -> Status;

    /// Build a reader over a physical or virtual stream. Nothing is read
    /// until the returned stream is iterated.
    fn load(
        &self,
        selector: impl Into<StreamSelector>,
        filter: Option<EventStreamFilter>,
    ) -> Self::Stream;

    /// Atomically append `events` to `stream` if `expected_version` holds
    fn commit(
        &self,
        stream: &StreamName,
        events: impl Into<Events>,
        expected_version: ExpectedVersion,
    ) -> Result<CommitResult>;

    /// Remove every event of one stream, returning how many rows went away
    fn delete_stream(&self, stream: &StreamName) -> Result<u64>;
}
