use crate::error::{ChronikError, Result};
use crate::types::event::{CorrelationId, EventType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

bounded_string!(
    /// Name of one physical stream, usually in the format "<BoundedContext>:<StreamName>"
    StreamName,
    100
);

/// Position of an event within its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of the first event in every stream
    pub const FIRST: Version = Version(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current version of a stream, `None` if the stream does not exist
pub type MaybeVersion = Option<Version>;

/// Global position of an event across all streams, assigned by storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// "No position": storage never assigns it to an event
    pub const NONE: SequenceNumber = SequenceNumber(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only logical view spanning multiple physical streams
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualStreamName {
    /// Every event in the log
    All,
    /// All streams whose name starts with the prefix
    Category(String),
    /// All events sharing a correlation id
    ByCorrelation(CorrelationId),
}

impl VirtualStreamName {
    pub fn all() -> Self {
        VirtualStreamName::All
    }

    pub fn for_category(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.chars().count() > StreamName::MAX_LENGTH {
            return Err(ChronikError::InvalidArgument(format!(
                "Category prefix must have 1 to {} characters, got {:?}",
                StreamName::MAX_LENGTH,
                prefix
            )));
        }
        Ok(VirtualStreamName::Category(prefix))
    }

    pub fn for_correlation_id(correlation_id: CorrelationId) -> Self {
        VirtualStreamName::ByCorrelation(correlation_id)
    }
}

/// Which part of the log a read covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamSelector {
    Exact(StreamName),
    All,
    Category(String),
    ByCorrelation(CorrelationId),
}

impl From<StreamName> for StreamSelector {
    fn from(name: StreamName) -> Self {
        StreamSelector::Exact(name)
    }
}

impl From<&StreamName> for StreamSelector {
    fn from(name: &StreamName) -> Self {
        StreamSelector::Exact(name.clone())
    }
}

impl From<VirtualStreamName> for StreamSelector {
    fn from(name: VirtualStreamName) -> Self {
        match name {
            VirtualStreamName::All => StreamSelector::All,
            VirtualStreamName::Category(prefix) => StreamSelector::Category(prefix),
            VirtualStreamName::ByCorrelation(id) => StreamSelector::ByCorrelation(id),
        }
    }
}

impl fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSelector::Exact(name) => write!(f, "{}", name),
            StreamSelector::All => f.write_str("$all"),
            StreamSelector::Category(prefix) => write!(f, "$category:{}", prefix),
            StreamSelector::ByCorrelation(id) => write!(f, "$correlation:{}", id),
        }
    }
}

/// Write precondition evaluated against a stream's current version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// No check
    Any,
    /// The stream must not exist yet
    NoStream,
    /// The stream's current version must equal this one
    Exact(Version),
}

impl ExpectedVersion {
    /// Check the precondition; failure is a concurrency error
    pub fn verify(self, actual: MaybeVersion) -> Result<()> {
        match (self, actual) {
            (ExpectedVersion::Any, _) => Ok(()),
            (ExpectedVersion::NoStream, None) => Ok(()),
            (ExpectedVersion::NoStream, Some(version)) => Err(ChronikError::Concurrency(format!(
                "Expected stream to not exist, but it is at version {}",
                version
            ))),
            (ExpectedVersion::Exact(expected), Some(version)) if expected == version => Ok(()),
            (ExpectedVersion::Exact(expected), Some(version)) => {
                Err(ChronikError::Concurrency(format!(
                    "Expected version: {}, actual version: {}",
                    expected, version
                )))
            }
            (ExpectedVersion::Exact(expected), None) => Err(ChronikError::Concurrency(format!(
                "Expected version: {}, but the stream does not exist",
                expected
            ))),
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("any"),
            ExpectedVersion::NoStream => f.write_str("no stream"),
            ExpectedVersion::Exact(version) => write!(f, "{}", version),
        }
    }
}

/// Restricts a read to a set of event types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStreamFilter {
    pub event_types: Option<BTreeSet<EventType>>,
}

impl EventStreamFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_event_types(event_types: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            event_types: Some(event_types.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_version_any_always_passes() {
        assert!(ExpectedVersion::Any.verify(None).is_ok());
        assert!(ExpectedVersion::Any.verify(Some(Version::new(7))).is_ok());
    }

    #[test]
    fn test_expected_version_no_stream() {
        assert!(ExpectedVersion::NoStream.verify(None).is_ok());
        let err = ExpectedVersion::NoStream
            .verify(Some(Version::FIRST))
            .unwrap_err();
        assert!(err.is_concurrency());
    }

    #[test]
    fn test_expected_version_exact() {
        let expected = ExpectedVersion::Exact(Version::new(2));
        assert!(expected.verify(Some(Version::new(2))).is_ok());
        assert!(expected.verify(Some(Version::new(3))).unwrap_err().is_concurrency());
        assert!(expected.verify(None).unwrap_err().is_concurrency());
    }

    #[test]
    fn test_version_and_sequence_number_arithmetic() {
        assert_eq!(Version::FIRST.next(), Version::new(1));
        assert!(SequenceNumber::NONE.is_none());
        assert_eq!(SequenceNumber::NONE.next(), SequenceNumber::new(1));
        assert!(!SequenceNumber::new(1).is_none());
    }

    #[test]
    fn test_selector_from_virtual_stream_name() {
        let category = VirtualStreamName::for_category("order-").unwrap();
        assert_eq!(
            StreamSelector::from(category),
            StreamSelector::Category("order-".into())
        );
        assert_eq!(StreamSelector::from(VirtualStreamName::all()), StreamSelector::All);
        assert!(VirtualStreamName::for_category("").is_err());
    }
}
