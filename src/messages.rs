//! Command payload messages exchanged with the log store.
//!
//! One message shape per command payload, mirroring the store's schema.
//! They pass through [`crate::codec`] and are otherwise opaque to the
//! transport; resolved-event envelopes are unpacked by [`crate::event`]
//! before reaching consumers.

use serde::{Deserialize, Serialize};

use crate::results::{OperationResult, ReadAllResult, ReadStreamResult, SubscriptionDropReason};

/// An event as submitted by a write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_id: [u8; 16],
    pub event_type: String,
    /// 1 = JSON, 0 = opaque binary.
    pub data_content_type: i32,
    pub metadata_content_type: i32,
    pub data: Vec<u8>,
    pub metadata: Option<Vec<u8>>,
}

/// An event as persisted by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_stream_id: String,
    pub event_number: i64,
    pub event_id: [u8; 16],
    pub event_type: String,
    pub data_content_type: i32,
    pub metadata_content_type: i32,
    pub data: Vec<u8>,
    pub metadata: Option<Vec<u8>>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_epoch: i64,
}

/// An event plus, for resolved link-to events, the link that pointed at it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEventDto {
    pub event: Option<EventRecord>,
    pub link: Option<EventRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEvents {
    pub event_stream_id: String,
    pub expected_version: i64,
    pub events: Vec<NewEvent>,
    pub require_master: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEventsCompleted {
    pub result: OperationResult,
    pub message: Option<String>,
    pub first_event_number: i64,
    pub last_event_number: i64,
    pub prepare_position: Option<i64>,
    pub commit_position: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStream {
    pub event_stream_id: String,
    pub expected_version: i64,
    pub require_master: bool,
    pub hard_delete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStreamCompleted {
    pub result: OperationResult,
    pub message: Option<String>,
    pub prepare_position: Option<i64>,
    pub commit_position: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStreamEvents {
    pub event_stream_id: String,
    pub from_event_number: i64,
    pub max_count: i32,
    pub resolve_link_tos: bool,
    pub require_master: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStreamEventsCompleted {
    pub events: Vec<ResolvedEventDto>,
    pub result: ReadStreamResult,
    pub next_event_number: i64,
    pub last_event_number: i64,
    pub is_end_of_stream: bool,
    pub last_commit_position: i64,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAllEvents {
    pub commit_position: i64,
    pub prepare_position: i64,
    pub max_count: i32,
    pub resolve_link_tos: bool,
    pub require_master: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAllEventsCompleted {
    pub commit_position: i64,
    pub prepare_position: i64,
    pub events: Vec<ResolvedEventDto>,
    pub next_commit_position: i64,
    pub next_prepare_position: i64,
    pub result: ReadAllResult,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeToStream {
    pub event_stream_id: String,
    pub resolve_link_tos: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfirmation {
    pub last_commit_position: i64,
    /// `None` when the subscribed stream has no events yet.
    pub last_event_number: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEventAppeared {
    pub event: ResolvedEventDto,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeFromStream;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDropped {
    pub reason: SubscriptionDropReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotHandled {
    pub reason: i32,
    pub additional_info: Option<Vec<u8>>,
}
