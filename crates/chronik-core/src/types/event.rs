use crate::error::{ChronikError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

bounded_string!(
    /// Globally unique event identifier, usually a UUID
    EventId,
    36
);

impl EventId {
    /// Generate a fresh random (v4) identifier
    pub fn create() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

bounded_string!(
    /// Event type tag, often in the format "<BoundedContext>:<EventType>"
    EventType,
    100
);

bounded_string!(
    /// Id of the event that caused an event
    CausationId,
    40
);

bounded_string!(
    /// Id grouping all events of one causal chain
    CorrelationId,
    40
);

/// Opaque event payload, usually a JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(String);

impl EventData {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Serialize a value as the JSON payload
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_string(value)
            .map(Self)
            .map_err(|e| ChronikError::InvalidArgument(format!("Failed to encode event data: {}", e)))
    }

    /// Decode the payload as JSON into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.0)
            .map_err(|e| ChronikError::Deserialization(format!("Failed to decode event data: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventData {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EventData {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Key-value metadata attached to an event, opaque to the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMetadata(Map<String, Value>);

impl EventMetadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse metadata from its stored JSON form
    ///
    /// Anything but a JSON object is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(ChronikError::Deserialization(format!(
                "Event metadata must be a JSON object, got: {}",
                other
            ))),
            Err(e) => Err(ChronikError::Deserialization(format!(
                "Failed to parse event metadata: {}",
                e
            ))),
        }
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// An immutable fact to be committed to a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub data: EventData,
    pub metadata: Option<EventMetadata>,
    pub causation_id: Option<CausationId>,
    pub correlation_id: Option<CorrelationId>,
}

impl Event {
    pub fn new(id: EventId, event_type: EventType, data: EventData) -> Self {
        Self {
            id,
            event_type,
            data,
            metadata: None,
            causation_id: None,
            correlation_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_causation_id(mut self, causation_id: CausationId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// A non-empty, ordered batch of events committed together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Events(Vec<Event>);

impl Events {
    pub fn new(events: Vec<Event>) -> Result<Self> {
        if events.is_empty() {
            return Err(ChronikError::InvalidArgument(
                "Events must contain at least one event".into(),
            ));
        }
        Ok(Self(events))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Event> {
        self.0
    }
}

impl From<Event> for Events {
    fn from(event: Event) -> Self {
        Self(vec![event])
    }
}

impl TryFrom<Vec<Event>> for Events {
    type Error = ChronikError;

    fn try_from(events: Vec<Event>) -> Result<Self> {
        Self::new(events)
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
