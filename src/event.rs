//! Consumer-facing event records and envelope unpacking.
//!
//! Read and subscribe payloads carry resolved-event envelopes; before they
//! reach callers, identifiers are formatted as canonical text, creation
//! epochs become timestamps, and data/metadata bytes are classified as JSON
//! or opaque binary.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    codec::CodecError,
    messages::{EventRecord, NewEvent, ResolvedEventDto},
};

/// Errors raised while unpacking a resolved-event envelope.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// The envelope carried no event record.
    #[error("resolved event carries no event record")]
    MissingEventRecord,
    /// Data was tagged as JSON but does not parse.
    #[error("JSON-tagged event data does not parse: {0}")]
    InvalidJson(#[source] serde_json::Error),
    /// The creation epoch is outside the representable timestamp range.
    #[error("event creation epoch {0} is out of range")]
    CreatedOutOfRange(i64),
}

/// Errors raised validating an event identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventIdError {
    /// Raw identifiers must be exactly 16 bytes.
    #[error("event identifier must be 16 bytes, got {0}")]
    WrongLength(usize),
    /// Text identifiers must contain exactly 32 hex digits.
    #[error("event identifier must contain exactly 32 hex digits: {0:?}")]
    MalformedText(String),
}

/// Identifier attached to a written event.
///
/// Accepts a raw 16-byte value or a 32-hex-digit string (separator
/// characters are stripped, so dashed GUID text is fine). Anything else is
/// rejected here, before any bytes reach the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId([u8; 16]);

impl EventId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self { Self(Uuid::new_v4().into_bytes()) }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self { Self(bytes) }

    /// Accept exactly 16 raw bytes.
    ///
    /// # Errors
    /// Returns [`EventIdError::WrongLength`] for any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EventIdError> {
        let raw: [u8; 16] = bytes
            .try_into()
            .map_err(|_| EventIdError::WrongLength(bytes.len()))?;
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] { &self.0 }
}

impl Default for EventId {
    fn default() -> Self { Self::new() }
}

impl std::str::FromStr for EventId {
    type Err = EventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(char::is_ascii_hexdigit).collect();
        if hex.len() != 32 {
            return Err(EventIdError::MalformedText(s.to_owned()));
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
                .map_err(|_| EventIdError::MalformedText(s.to_owned()))?;
        }
        Ok(Self(bytes))
    }
}

/// Event payload bytes with their content-type classification.
#[derive(Clone, Debug, PartialEq)]
pub enum EventData {
    /// Structured payload, carried with the JSON content-type tag.
    Json(serde_json::Value),
    /// Opaque payload, carried with the binary content-type tag.
    Binary(Bytes),
}

impl EventData {
    /// Content-type tag recorded on the wire for this payload.
    #[must_use]
    pub const fn content_type(&self) -> i32 {
        match self {
            Self::Json(_) => 1,
            Self::Binary(_) => 0,
        }
    }

    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Binary(_) => None,
        }
    }

    #[must_use]
    pub const fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Json(_) => None,
        }
    }

    /// Hex rendering of a binary payload.
    #[must_use]
    pub fn to_hex(&self) -> Option<String> {
        self.as_binary()
            .map(|bytes| bytes.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    fn to_wire(&self) -> Result<(i32, Vec<u8>), CodecError> {
        match self {
            Self::Json(value) => Ok((1, serde_json::to_vec(value)?)),
            Self::Binary(bytes) => Ok((0, bytes.to_vec())),
        }
    }
}

/// An event supplied to a write operation.
#[derive(Clone, Debug)]
pub struct ProposedEvent {
    pub event_id: EventId,
    pub event_type: String,
    pub data: EventData,
    pub metadata: Option<EventData>,
}

impl ProposedEvent {
    /// Structured event with a fresh identifier and no metadata.
    #[must_use]
    pub fn json(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            data: EventData::Json(data),
            metadata: None,
        }
    }

    /// Opaque-binary event with a fresh identifier and no metadata.
    #[must_use]
    pub fn binary(event_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            data: EventData::Binary(data.into()),
            metadata: None,
        }
    }

    pub(crate) fn into_new_event(self) -> Result<NewEvent, CodecError> {
        let (data_content_type, data) = self.data.to_wire()?;
        let (metadata_content_type, metadata) = match &self.metadata {
            Some(metadata) => {
                let (content_type, bytes) = metadata.to_wire()?;
                (content_type, Some(bytes))
            }
            None => (0, None),
        };
        Ok(NewEvent {
            event_id: *self.event_id.as_bytes(),
            event_type: self.event_type,
            data_content_type,
            metadata_content_type,
            data,
            metadata,
        })
    }
}

/// One event as consumers observe it after envelope unpacking.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    pub stream_id: String,
    /// Monotonically increasing position within the stream.
    pub event_number: i64,
    /// Canonical text form of the 16-byte identifier.
    pub event_id: String,
    pub event_type: String,
    pub created: DateTime<Utc>,
    pub data: EventData,
    pub metadata: Option<EventData>,
}

/// An event plus, for resolved link-to events, the link that pointed at it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedEvent {
    pub event: RecordedEvent,
    pub link: Option<RecordedEvent>,
}

impl ResolvedEvent {
    /// The record that tracks position in the subscribed stream: the link
    /// when present, otherwise the event itself.
    #[must_use]
    pub fn original_event(&self) -> &RecordedEvent { self.link.as_ref().unwrap_or(&self.event) }

    #[must_use]
    pub fn original_event_number(&self) -> i64 { self.original_event().event_number }
}

/// Canonical text form of a 16-byte identifier as the wire carries it
/// (mixed-endian: the first three groups are byte-swapped).
#[must_use]
pub fn guid_string(bytes: &[u8; 16]) -> String { Uuid::from_bytes_le(*bytes).to_string() }

pub(crate) fn unpack_resolved_event(dto: ResolvedEventDto) -> Result<ResolvedEvent, UnpackError> {
    let event = dto.event.ok_or(UnpackError::MissingEventRecord)?;
    Ok(ResolvedEvent {
        event: unpack_event_record(event)?,
        link: dto.link.map(unpack_event_record).transpose()?,
    })
}

fn unpack_event_record(record: EventRecord) -> Result<RecordedEvent, UnpackError> {
    let EventRecord {
        event_stream_id,
        event_number,
        event_id,
        event_type,
        data_content_type,
        metadata_content_type: _,
        data,
        metadata,
        created_epoch,
    } = record;

    let created = DateTime::from_timestamp_millis(created_epoch)
        .ok_or(UnpackError::CreatedOutOfRange(created_epoch))?;
    let data = if data_content_type == 1 {
        EventData::Json(serde_json::from_slice(&data).map_err(UnpackError::InvalidJson)?)
    } else {
        EventData::Binary(Bytes::from(data))
    };

    Ok(RecordedEvent {
        stream_id: event_stream_id,
        event_number,
        event_id: guid_string(&event_id),
        event_type,
        created,
        data,
        metadata: unpack_metadata(metadata),
    })
}

/// The store mirrors the data content-type onto metadata, so the wire tag is
/// ignored: parse as JSON when possible, otherwise keep the raw bytes.
fn unpack_metadata(metadata: Option<Vec<u8>>) -> Option<EventData> {
    let bytes = metadata?;
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(EventData::Json(value)),
        Err(_) => Some(EventData::Binary(Bytes::from(bytes))),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::{EventData, EventId, EventIdError, guid_string, unpack_resolved_event};
    use crate::messages::{EventRecord, ResolvedEventDto};

    fn record(data_content_type: i32, data: &[u8], metadata: Option<&[u8]>) -> EventRecord {
        EventRecord {
            event_stream_id: "inventory-1".into(),
            event_number: 9,
            event_id: *EventId::new().as_bytes(),
            event_type: "stock-adjusted".into(),
            data_content_type,
            // Mirrors the data tag, as the store does.
            metadata_content_type: data_content_type,
            data: data.to_vec(),
            metadata: metadata.map(<[u8]>::to_vec),
            created_epoch: 1_700_000_000_000,
        }
    }

    #[test]
    fn accepts_raw_16_byte_identifiers() {
        let id = EventId::from_slice(&[0xAB; 16]).expect("16 raw bytes must be accepted");
        assert_eq!(id.as_bytes(), &[0xAB; 16]);
    }

    #[rstest]
    #[case("f47ac10b58cc4372a5670e02b2c3d479")]
    #[case("f47ac10b-58cc-4372-a567-0e02b2c3d479")]
    #[case("F47AC10B-58CC-4372-A567-0E02B2C3D479")]
    fn accepts_32_hex_digit_text(#[case] text: &str) {
        let id: EventId = text.parse().expect("hex text must be accepted");
        assert_eq!(id.as_bytes()[0], 0xF4);
        assert_eq!(id.as_bytes()[15], 0x79);
    }

    #[rstest]
    #[case("f47ac10b58cc4372a5670e02b2c3d4")] // 30 digits
    #[case("f47ac10b58cc4372a5670e02b2c3d47900")] // 34 digits
    #[case("not-a-guid")]
    #[case("")]
    fn rejects_malformed_text(#[case] text: &str) {
        let err = text.parse::<EventId>().unwrap_err();
        assert!(matches!(err, EventIdError::MalformedText(_)));
    }

    #[test]
    fn rejects_wrong_length_slices() {
        assert_eq!(
            EventId::from_slice(&[0u8; 15]),
            Err(EventIdError::WrongLength(15))
        );
    }

    #[test]
    fn guid_text_swaps_the_first_three_groups() {
        let bytes = [
            0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        assert_eq!(guid_string(&bytes), "00112233-4455-6677-8899-aabbccddeeff");
    }

    #[test]
    fn json_tagged_data_is_parsed() {
        let dto = ResolvedEventDto {
            event: Some(record(1, br#"{"count":3}"#, None)),
            link: None,
        };
        let resolved = unpack_resolved_event(dto).expect("unpack failed");
        assert_eq!(resolved.event.data.as_json(), Some(&json!({"count": 3})));
    }

    #[test]
    fn binary_tagged_data_stays_binary_even_when_it_looks_like_json() {
        let dto = ResolvedEventDto {
            event: Some(record(0, br#"{"count":3}"#, None)),
            link: None,
        };
        let resolved = unpack_resolved_event(dto).expect("unpack failed");
        let data = &resolved.event.data;
        assert!(data.as_json().is_none());
        assert_eq!(data.to_hex().expect("binary data has a hex form").len(), 22);
    }

    #[test]
    fn metadata_ignores_its_tag_and_parses_genuine_json() {
        // Binary data mirrors a binary tag onto JSON metadata.
        let dto = ResolvedEventDto {
            event: Some(record(0, &[0x01, 0x02], Some(br#"{"actor":"ops"}"#))),
            link: None,
        };
        let resolved = unpack_resolved_event(dto).expect("unpack failed");
        assert_eq!(
            resolved.event.metadata.as_ref().and_then(EventData::as_json),
            Some(&json!({"actor": "ops"}))
        );
    }

    #[test]
    fn unparseable_metadata_falls_back_to_binary() {
        let dto = ResolvedEventDto {
            event: Some(record(1, b"{}", Some(&[0xDE, 0xAD]))),
            link: None,
        };
        let resolved = unpack_resolved_event(dto).expect("unpack failed");
        let metadata = resolved.event.metadata.expect("metadata present");
        assert_eq!(metadata.to_hex().as_deref(), Some("dead"));
    }

    #[test]
    fn empty_metadata_unpacks_as_none() {
        let dto = ResolvedEventDto {
            event: Some(record(1, b"{}", Some(&[]))),
            link: None,
        };
        let resolved = unpack_resolved_event(dto).expect("unpack failed");
        assert!(resolved.event.metadata.is_none());
    }

    #[test]
    fn link_supersedes_the_event_for_position_tracking() {
        let mut link = record(0, &[], None);
        link.event_number = 42;
        link.event_stream_id = "projection-a".into();
        let dto = ResolvedEventDto {
            event: Some(record(0, &[], None)),
            link: Some(link),
        };
        let resolved = unpack_resolved_event(dto).expect("unpack failed");
        assert_eq!(resolved.original_event_number(), 42);
        assert_eq!(resolved.original_event().stream_id, "projection-a");
        assert_eq!(resolved.event.event_number, 9);
    }
}
