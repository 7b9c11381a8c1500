/// Declares a validated, length-bounded string newtype.
///
/// Values are rejected when empty or longer than `MAX_LENGTH` characters.
/// Serde goes through the same validation.
macro_rules! bounded_string {
    ($(#[$meta:meta])* $name:ident, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const MAX_LENGTH: usize = $max;

            pub fn new(value: impl Into<String>) -> $crate::error::Result<Self> {
                let value = value.into();
                if value.is_empty() {
                    return Err($crate::error::ChronikError::InvalidArgument(format!(
                        "{} must not be empty",
                        stringify!($name)
                    )));
                }
                let length = value.chars().count();
                if length > Self::MAX_LENGTH {
                    return Err($crate::error::ChronikError::InvalidArgument(format!(
                        "{} must not exceed {} characters, got {} for {:?}",
                        stringify!($name),
                        Self::MAX_LENGTH,
                        length,
                        value
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::error::ChronikError;

            fn try_from(value: String) -> $crate::error::Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = $crate::error::ChronikError;

            fn try_from(value: &str) -> $crate::error::Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub mod envelope;
pub mod event;
pub mod status;
pub mod stream;

pub use envelope::{CommitResult, EventEnvelope};
pub use event::{CausationId, CorrelationId, Event, EventData, EventId, EventMetadata, EventType, Events};
pub use status::{Status, StatusType};
pub use stream::{
    EventStreamFilter, ExpectedVersion, MaybeVersion, SequenceNumber, StreamName, StreamSelector,
    Version, VirtualStreamName,
};
