//! Mapping between table rows and envelopes

use chronik_core::{
    CausationId, ChronikError, CorrelationId, Event, EventData, EventEnvelope, EventId,
    EventMetadata, EventType, Result, SequenceNumber, StreamName, Version,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Columns selected by every read, in [`RawRow::from_row`] order
pub(crate) const SELECT_COLUMNS: &str = "sequencenumber, stream, version, type, payload, \
     metadata, id, causationid, correlationid, recordedat";

const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_WRITE_FORMAT).to_string()
}

/// Parse a stored `recordedat`; fractional seconds are optional
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_READ_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| {
            ChronikError::Deserialization(format!(
                "Failed to parse recordedat {:?}: {}",
                value, e
            ))
        })
}

/// A row exactly as the driver returned it, before validation
pub(crate) struct RawRow {
    pub sequence_number: i64,
    stream: String,
    version: i64,
    event_type: String,
    payload: String,
    metadata: Option<String>,
    id: String,
    causation_id: Option<String>,
    correlation_id: Option<String>,
    recorded_at: String,
}

impl RawRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence_number: row.get(0)?,
            stream: row.get(1)?,
            version: row.get(2)?,
            event_type: row.get(3)?,
            payload: row.get(4)?,
            metadata: row.get(5)?,
            id: row.get(6)?,
            causation_id: row.get(7)?,
            correlation_id: row.get(8)?,
            recorded_at: row.get(9)?,
        })
    }

    pub fn into_envelope(self) -> Result<EventEnvelope> {
        let sequence_number = self.sequence_number;
        let corrupt = |what: &str, e: ChronikError| {
            ChronikError::Deserialization(format!(
                "Invalid {} at sequence number {}: {}",
                what, sequence_number, e
            ))
        };

        let metadata = self
            .metadata
            .as_deref()
            .map(EventMetadata::from_json)
            .transpose()
            .map_err(|e| corrupt("metadata", e))?;
        let causation_id = self
            .causation_id
            .map(CausationId::new)
            .transpose()
            .map_err(|e| corrupt("causation id", e))?;
        let correlation_id = self
            .correlation_id
            .map(CorrelationId::new)
            .transpose()
            .map_err(|e| corrupt("correlation id", e))?;

        let event = Event {
            id: EventId::new(self.id).map_err(|e| corrupt("event id", e))?,
            event_type: EventType::new(self.event_type).map_err(|e| corrupt("event type", e))?,
            data: EventData::new(self.payload),
            metadata,
            causation_id,
            correlation_id,
        };

        Ok(EventEnvelope {
            event,
            stream_name: StreamName::new(self.stream).map_err(|e| corrupt("stream name", e))?,
            version: Version::new(non_negative(self.version, "version", sequence_number)?),
            sequence_number: SequenceNumber::new(non_negative(
                sequence_number,
                "sequence number",
                sequence_number,
            )?),
            recorded_at: parse_timestamp(&self.recorded_at)?,
        })
    }
}

fn non_negative(value: i64, what: &str, sequence_number: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        ChronikError::Deserialization(format!(
            "Negative {} {} at sequence number {}",
            what, value, sequence_number
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_timestamp_keeps_microseconds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
            + chrono::Duration::microseconds(123_456);
        let stored = format_timestamp(at);
        assert_eq!(stored, "2024-05-06 07:08:09.123456");
        assert_eq!(parse_timestamp(&stored).unwrap(), at);
    }

    #[test]
    fn test_timestamp_without_fraction() {
        let parsed = parse_timestamp("2024-05-06 07:08:09").unwrap();
        assert_eq!(parsed.second(), 9);
        assert_eq!(parsed.nanosecond(), 0);
    }

    #[test]
    fn test_malformed_timestamp() {
        let err = parse_timestamp("yesterday at noon").unwrap_err();
        assert!(matches!(err, ChronikError::Deserialization(_)));
    }
}
