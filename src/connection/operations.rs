//! Request/response operations: range reads, writes, deletes.
//!
//! Each operation encodes its request, awaits the single response frame,
//! and maps the response command onto the operation family's result codes.
//! Business failures come back as result codes on the completion; only
//! transport and codec faults are errors.

use super::Connection;
use crate::{
    codec,
    command::Command,
    credentials::Credentials,
    error::Result,
    event::{ProposedEvent, ResolvedEvent, unpack_resolved_event},
    frame::Frame,
    messages::{
        DeleteStream, DeleteStreamCompleted, NotHandled, ReadAllEvents, ReadAllEventsCompleted,
        ReadStreamEvents, ReadStreamEventsCompleted, ResolvedEventDto, WriteEvents,
        WriteEventsCompleted,
    },
    results::{ExpectedVersion, OperationResult, ReadAllResult, ReadStreamResult},
};

const NOT_AUTHENTICATED_TEXT: &str = "Not authenticated";

/// Completion of a stream-range read, events already unpacked.
#[derive(Clone, Debug)]
pub struct StreamSlice {
    pub result: ReadStreamResult,
    pub events: Vec<ResolvedEvent>,
    pub next_event_number: i64,
    pub last_event_number: i64,
    pub is_end_of_stream: bool,
    pub last_commit_position: i64,
    pub error: Option<String>,
}

impl StreamSlice {
    fn failed(result: ReadStreamResult, error: String) -> Self {
        Self {
            result,
            events: Vec::new(),
            next_event_number: 0,
            last_event_number: 0,
            is_end_of_stream: true,
            last_commit_position: 0,
            error: Some(error),
        }
    }
}

/// Completion of a global-log read, events already unpacked.
#[derive(Clone, Debug)]
pub struct AllSlice {
    pub result: ReadAllResult,
    pub events: Vec<ResolvedEvent>,
    pub commit_position: i64,
    pub prepare_position: i64,
    pub next_commit_position: i64,
    pub next_prepare_position: i64,
    pub error: Option<String>,
}

impl AllSlice {
    fn failed(result: ReadAllResult, error: String) -> Self {
        Self {
            result,
            events: Vec::new(),
            commit_position: 0,
            prepare_position: 0,
            next_commit_position: 0,
            next_prepare_position: 0,
            error: Some(error),
        }
    }
}

impl Connection {
    /// Read a range of one stream in ascending event-number order.
    ///
    /// # Errors
    /// Returns an error on transport or codec failure; read failures are
    /// reported through [`StreamSlice::result`].
    pub async fn read_stream_events_forward(
        &self,
        stream: &str,
        from_event_number: i64,
        max_count: i32,
        resolve_link_tos: bool,
        require_master: bool,
        credentials: Option<Credentials>,
    ) -> Result<StreamSlice> {
        self.read_stream(
            Command::ReadStreamEventsForward,
            stream,
            from_event_number,
            max_count,
            resolve_link_tos,
            require_master,
            credentials,
        )
        .await
    }

    /// Read a range of one stream in descending event-number order.
    ///
    /// # Errors
    /// Returns an error on transport or codec failure; read failures are
    /// reported through [`StreamSlice::result`].
    pub async fn read_stream_events_backward(
        &self,
        stream: &str,
        from_event_number: i64,
        max_count: i32,
        resolve_link_tos: bool,
        require_master: bool,
        credentials: Option<Credentials>,
    ) -> Result<StreamSlice> {
        self.read_stream(
            Command::ReadStreamEventsBackward,
            stream,
            from_event_number,
            max_count,
            resolve_link_tos,
            require_master,
            credentials,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn read_stream(
        &self,
        command: Command,
        stream: &str,
        from_event_number: i64,
        max_count: i32,
        resolve_link_tos: bool,
        require_master: bool,
        credentials: Option<Credentials>,
    ) -> Result<StreamSlice> {
        let payload = codec::encode(&ReadStreamEvents {
            event_stream_id: stream.to_owned(),
            from_event_number,
            max_count,
            resolve_link_tos,
            require_master,
        })?;
        let response = self.request(command, credentials, payload).await?;

        match Command::from_u8(response.command) {
            Some(
                Command::ReadStreamEventsForwardCompleted
                | Command::ReadStreamEventsBackwardCompleted,
            ) => {
                let message: ReadStreamEventsCompleted = codec::decode(&response.payload)?;
                Ok(StreamSlice {
                    result: message.result,
                    events: unpack_events(message.events)?,
                    next_event_number: message.next_event_number,
                    last_event_number: message.last_event_number,
                    is_end_of_stream: message.is_end_of_stream,
                    last_commit_position: message.last_commit_position,
                    error: message.error,
                })
            }
            Some(Command::NotAuthenticated) => Ok(StreamSlice::failed(
                ReadStreamResult::AccessDenied,
                NOT_AUTHENTICATED_TEXT.to_owned(),
            )),
            _ => Ok(StreamSlice::failed(
                ReadStreamResult::Error,
                describe_failure(&response)?,
            )),
        }
    }

    /// Read a range of the global log in commit order.
    ///
    /// # Errors
    /// Returns an error on transport or codec failure; read failures are
    /// reported through [`AllSlice::result`].
    pub async fn read_all_events_forward(
        &self,
        commit_position: i64,
        prepare_position: i64,
        max_count: i32,
        resolve_link_tos: bool,
        require_master: bool,
        credentials: Option<Credentials>,
    ) -> Result<AllSlice> {
        self.read_all(
            Command::ReadAllEventsForward,
            commit_position,
            prepare_position,
            max_count,
            resolve_link_tos,
            require_master,
            credentials,
        )
        .await
    }

    /// Read a range of the global log in reverse commit order.
    ///
    /// # Errors
    /// Returns an error on transport or codec failure; read failures are
    /// reported through [`AllSlice::result`].
    pub async fn read_all_events_backward(
        &self,
        commit_position: i64,
        prepare_position: i64,
        max_count: i32,
        resolve_link_tos: bool,
        require_master: bool,
        credentials: Option<Credentials>,
    ) -> Result<AllSlice> {
        self.read_all(
            Command::ReadAllEventsBackward,
            commit_position,
            prepare_position,
            max_count,
            resolve_link_tos,
            require_master,
            credentials,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn read_all(
        &self,
        command: Command,
        commit_position: i64,
        prepare_position: i64,
        max_count: i32,
        resolve_link_tos: bool,
        require_master: bool,
        credentials: Option<Credentials>,
    ) -> Result<AllSlice> {
        let payload = codec::encode(&ReadAllEvents {
            commit_position,
            prepare_position,
            max_count,
            resolve_link_tos,
            require_master,
        })?;
        let response = self.request(command, credentials, payload).await?;

        match Command::from_u8(response.command) {
            Some(
                Command::ReadAllEventsForwardCompleted | Command::ReadAllEventsBackwardCompleted,
            ) => {
                let message: ReadAllEventsCompleted = codec::decode(&response.payload)?;
                Ok(AllSlice {
                    result: message.result,
                    events: unpack_events(message.events)?,
                    commit_position: message.commit_position,
                    prepare_position: message.prepare_position,
                    next_commit_position: message.next_commit_position,
                    next_prepare_position: message.next_prepare_position,
                    error: message.error,
                })
            }
            Some(Command::NotAuthenticated) => Ok(AllSlice::failed(
                ReadAllResult::AccessDenied,
                NOT_AUTHENTICATED_TEXT.to_owned(),
            )),
            _ => Ok(AllSlice::failed(
                ReadAllResult::Error,
                describe_failure(&response)?,
            )),
        }
    }

    /// Append events to a stream.
    ///
    /// Event identifiers are validated when each [`ProposedEvent`] is
    /// constructed, before any bytes are sent; data and metadata carry the
    /// content-type tag their [`crate::event::EventData`] variant implies.
    ///
    /// # Errors
    /// Returns an error on transport or codec failure; write failures are
    /// reported through [`WriteEventsCompleted::result`].
    pub async fn write_events(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        require_master: bool,
        events: Vec<ProposedEvent>,
        credentials: Option<Credentials>,
    ) -> Result<WriteEventsCompleted> {
        let mut new_events = Vec::with_capacity(events.len());
        for event in events {
            new_events.push(event.into_new_event()?);
        }
        let payload = codec::encode(&WriteEvents {
            event_stream_id: stream.to_owned(),
            expected_version: expected_version.as_i64(),
            events: new_events,
            require_master,
        })?;
        let response = self
            .request(Command::WriteEvents, credentials, payload)
            .await?;

        match Command::from_u8(response.command) {
            Some(Command::WriteEventsCompleted) => Ok(codec::decode(&response.payload)?),
            Some(Command::NotAuthenticated) => Ok(failed_write(
                OperationResult::AccessDenied,
                NOT_AUTHENTICATED_TEXT.to_owned(),
            )),
            _ => Ok(failed_write(
                OperationResult::Error,
                describe_failure(&response)?,
            )),
        }
    }

    /// Delete a stream, softly or permanently.
    ///
    /// # Errors
    /// Returns an error on transport or codec failure; delete failures are
    /// reported through [`DeleteStreamCompleted::result`].
    pub async fn delete_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        require_master: bool,
        hard_delete: bool,
        credentials: Option<Credentials>,
    ) -> Result<DeleteStreamCompleted> {
        let payload = codec::encode(&DeleteStream {
            event_stream_id: stream.to_owned(),
            expected_version: expected_version.as_i64(),
            require_master,
            hard_delete,
        })?;
        let response = self
            .request(Command::DeleteStream, credentials, payload)
            .await?;

        match Command::from_u8(response.command) {
            Some(Command::DeleteStreamCompleted) => Ok(codec::decode(&response.payload)?),
            Some(Command::NotAuthenticated) => Ok(DeleteStreamCompleted {
                result: OperationResult::AccessDenied,
                message: Some(NOT_AUTHENTICATED_TEXT.to_owned()),
                prepare_position: None,
                commit_position: None,
            }),
            _ => Ok(DeleteStreamCompleted {
                result: OperationResult::Error,
                message: Some(describe_failure(&response)?),
                prepare_position: None,
                commit_position: None,
            }),
        }
    }
}

fn failed_write(result: OperationResult, message: String) -> WriteEventsCompleted {
    WriteEventsCompleted {
        result,
        message: Some(message),
        first_event_number: 0,
        last_event_number: 0,
        prepare_position: None,
        commit_position: None,
    }
}

/// Text for the family's `Error` variant when the server rejected or could
/// not handle a request.
fn describe_failure(response: &Frame) -> Result<String> {
    Ok(match Command::from_u8(response.command) {
        Some(Command::NotHandled) => {
            let message: NotHandled = codec::decode(&response.payload)?;
            format!("not handled: reason {}", message.reason)
        }
        Some(Command::BadRequest) => {
            format!("bad request: {}", String::from_utf8_lossy(&response.payload))
        }
        _ => format!(
            "unexpected response: {}",
            Command::describe(response.command)
        ),
    })
}

fn unpack_events(dtos: Vec<ResolvedEventDto>) -> Result<Vec<ResolvedEvent>> {
    dtos.into_iter()
        .map(|dto| unpack_resolved_event(dto).map_err(Into::into))
        .collect()
}
