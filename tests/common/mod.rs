//! In-process mock log store used by the integration tests.
//!
//! `spawn_server` runs a single-connection frame loop around an arbitrary
//! handler; `MockStore` is a small in-memory store implementing the command
//! set the client speaks: writes, range reads, deletes, live subscriptions,
//! and pings. Tests that need precise wire timing script their own handler.

#![allow(dead_code)]

use std::{collections::HashMap, net::SocketAddr};

use bytes::Bytes;
use eventwire::{
    codec,
    command::Command,
    correlation::CorrelationId,
    credentials::Credentials,
    frame::{Frame, FrameAssembler},
    messages::{
        DeleteStream, DeleteStreamCompleted, EventRecord, ReadAllEvents, ReadAllEventsCompleted,
        ReadStreamEvents, ReadStreamEventsCompleted, ResolvedEventDto, StreamEventAppeared,
        SubscribeToStream, SubscriptionConfirmation, SubscriptionDropped, WriteEvents,
        WriteEventsCompleted,
    },
    results::{OperationResult, ReadAllResult, ReadStreamResult, SubscriptionDropReason},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

/// Fixed creation epoch (ms) the store stamps onto records.
pub const EPOCH_MS: i64 = 1_700_000_000_000;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Encode `message` and wrap it in a reply frame.
pub fn reply<M: serde::Serialize>(command: Command, id: CorrelationId, message: &M) -> Frame {
    Frame::new(command, id, codec::encode(message).expect("encode reply"))
}

/// A bare event record as the store would persist it.
pub fn record(stream: &str, number: i64) -> EventRecord {
    EventRecord {
        event_stream_id: stream.to_owned(),
        event_number: number,
        event_id: [0x11; 16],
        event_type: "test-event".to_owned(),
        data_content_type: 1,
        metadata_content_type: 1,
        data: format!("{{\"n\":{number}}}").into_bytes(),
        metadata: None,
        created_epoch: EPOCH_MS + number,
    }
}

/// Wrap a record in the push-notification payload.
pub fn appeared(record: EventRecord) -> StreamEventAppeared {
    StreamEventAppeared {
        event: ResolvedEventDto {
            event: Some(record),
            link: None,
        },
    }
}

/// Spawn a single-connection server driving `handle` for every inbound
/// frame; replies are written back in order.
pub async fn spawn_server<H>(mut handle: H) -> SocketAddr
where
    H: FnMut(Frame, &mut Vec<Frame>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut assembler = FrameAssembler::new();
        let mut chunk = vec![0u8; 8192];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            let frames = assembler
                .push_bytes(&chunk[..n])
                .expect("client sent a malformed frame");
            for frame in frames {
                let mut replies = Vec::new();
                handle(frame, &mut replies);
                for frame in replies {
                    let bytes = frame.encode().expect("encode reply");
                    if socket.write_all(&bytes).await.is_err() {
                        return;
                    }
                }
            }
        }
    });
    addr
}

pub async fn spawn_store(mut store: MockStore) -> SocketAddr {
    spawn_server(move |frame, out| store.handle(frame, out)).await
}

pub async fn connect(addr: SocketAddr) -> eventwire::Connection {
    eventwire::Connection::builder()
        .host("127.0.0.1")
        .port(addr.port())
        .connect()
        .await
        .expect("connect failed")
}

/// In-memory store handling the full command set.
#[derive(Default)]
pub struct MockStore {
    required: Option<Credentials>,
    streams: HashMap<String, Vec<EventRecord>>,
    log: Vec<EventRecord>,
    subscribers: Vec<(CorrelationId, String)>,
}

impl MockStore {
    pub fn new() -> Self { Self::default() }

    /// A store that rejects any frame not carrying these credentials.
    pub fn requiring(credentials: Credentials) -> Self {
        Self {
            required: Some(credentials),
            ..Self::default()
        }
    }

    pub fn handle(&mut self, frame: Frame, out: &mut Vec<Frame>) {
        if let Some(required) = &self.required {
            if frame.credentials.as_ref() != Some(required) {
                out.push(Frame::new(
                    Command::NotAuthenticated,
                    frame.correlation_id,
                    Bytes::new(),
                ));
                return;
            }
        }
        match Command::from_u8(frame.command) {
            Some(Command::Ping) => out.push(Frame::new(
                Command::Pong,
                frame.correlation_id,
                frame.payload.clone(),
            )),
            Some(Command::HeartbeatResponse) => {}
            Some(Command::WriteEvents) => self.write(&frame, out),
            Some(Command::DeleteStream) => self.delete(&frame, out),
            Some(Command::ReadStreamEventsForward) => self.read_stream(&frame, out, true),
            Some(Command::ReadStreamEventsBackward) => self.read_stream(&frame, out, false),
            Some(Command::ReadAllEventsForward) => self.read_all(&frame, out),
            Some(Command::SubscribeToStream) => self.subscribe(&frame, out),
            Some(Command::UnsubscribeFromStream) => self.unsubscribe(&frame, out),
            _ => out.push(Frame::new(
                Command::BadRequest,
                frame.correlation_id,
                Bytes::from_static(b"unsupported command"),
            )),
        }
    }

    fn write(&mut self, frame: &Frame, out: &mut Vec<Frame>) {
        let request: WriteEvents = codec::decode(&frame.payload).expect("decode WriteEvents");
        let stream_id = request.event_stream_id;
        let base = self.streams.get(&stream_id).map_or(0, Vec::len) as i64;

        let mut appended = Vec::new();
        for (offset, new_event) in request.events.into_iter().enumerate() {
            appended.push(EventRecord {
                event_stream_id: stream_id.clone(),
                event_number: base + offset as i64,
                event_id: new_event.event_id,
                event_type: new_event.event_type,
                data_content_type: new_event.data_content_type,
                // the store mirrors the data tag onto metadata
                metadata_content_type: new_event.data_content_type,
                data: new_event.data,
                metadata: new_event.metadata,
                created_epoch: EPOCH_MS + base + offset as i64,
            });
        }
        self.streams
            .entry(stream_id.clone())
            .or_default()
            .extend(appended.iter().cloned());
        self.log.extend(appended.iter().cloned());

        let completed = WriteEventsCompleted {
            result: OperationResult::Success,
            message: None,
            first_event_number: base,
            last_event_number: base + appended.len() as i64 - 1,
            prepare_position: Some(self.log.len() as i64),
            commit_position: Some(self.log.len() as i64),
        };
        out.push(reply(
            Command::WriteEventsCompleted,
            frame.correlation_id,
            &completed,
        ));

        for (subscriber, subscribed) in &self.subscribers {
            if *subscribed == stream_id {
                for record in &appended {
                    out.push(reply(
                        Command::StreamEventAppeared,
                        *subscriber,
                        &appeared(record.clone()),
                    ));
                }
            }
        }
    }

    fn delete(&mut self, frame: &Frame, out: &mut Vec<Frame>) {
        let request: DeleteStream = codec::decode(&frame.payload).expect("decode DeleteStream");
        self.streams.remove(&request.event_stream_id);
        out.push(reply(
            Command::DeleteStreamCompleted,
            frame.correlation_id,
            &DeleteStreamCompleted {
                result: OperationResult::Success,
                message: None,
                prepare_position: Some(self.log.len() as i64),
                commit_position: Some(self.log.len() as i64),
            },
        ));
    }

    fn read_stream(&mut self, frame: &Frame, out: &mut Vec<Frame>, forward: bool) {
        let request: ReadStreamEvents =
            codec::decode(&frame.payload).expect("decode ReadStreamEvents");
        let completed_command = if forward {
            Command::ReadStreamEventsForwardCompleted
        } else {
            Command::ReadStreamEventsBackwardCompleted
        };

        let Some(records) = self.streams.get(&request.event_stream_id) else {
            out.push(reply(
                completed_command,
                frame.correlation_id,
                &ReadStreamEventsCompleted {
                    events: Vec::new(),
                    result: ReadStreamResult::NoStream,
                    next_event_number: 0,
                    last_event_number: -1,
                    is_end_of_stream: true,
                    last_commit_position: self.log.len() as i64,
                    error: None,
                },
            ));
            return;
        };

        let last = records.len() as i64 - 1;
        let max = usize::try_from(request.max_count.max(0)).expect("max_count fits usize");
        let completed = if forward {
            let from = usize::try_from(request.from_event_number.max(0)).expect("from fits usize");
            let events: Vec<ResolvedEventDto> = records
                .iter()
                .skip(from)
                .take(max)
                .cloned()
                .map(|event| ResolvedEventDto {
                    event: Some(event),
                    link: None,
                })
                .collect();
            let next = request.from_event_number.max(0) + events.len() as i64;
            ReadStreamEventsCompleted {
                events,
                result: ReadStreamResult::Success,
                next_event_number: next,
                last_event_number: last,
                is_end_of_stream: next > last,
                last_commit_position: self.log.len() as i64,
                error: None,
            }
        } else {
            let mut events = Vec::new();
            let mut cursor = request.from_event_number.min(last);
            while cursor >= 0 && events.len() < max {
                events.push(ResolvedEventDto {
                    event: Some(records[usize::try_from(cursor).expect("cursor fits")].clone()),
                    link: None,
                });
                cursor -= 1;
            }
            ReadStreamEventsCompleted {
                events,
                result: ReadStreamResult::Success,
                next_event_number: cursor,
                last_event_number: last,
                is_end_of_stream: cursor < 0,
                last_commit_position: self.log.len() as i64,
                error: None,
            }
        };
        out.push(reply(completed_command, frame.correlation_id, &completed));
    }

    fn read_all(&mut self, frame: &Frame, out: &mut Vec<Frame>) {
        let request: ReadAllEvents = codec::decode(&frame.payload).expect("decode ReadAllEvents");
        let from = usize::try_from(request.commit_position.max(0)).expect("position fits usize");
        let max = usize::try_from(request.max_count.max(0)).expect("max_count fits usize");
        let events: Vec<ResolvedEventDto> = self
            .log
            .iter()
            .skip(from)
            .take(max)
            .cloned()
            .map(|event| ResolvedEventDto {
                event: Some(event),
                link: None,
            })
            .collect();
        let next = (from + events.len()) as i64;
        out.push(reply(
            Command::ReadAllEventsForwardCompleted,
            frame.correlation_id,
            &ReadAllEventsCompleted {
                commit_position: request.commit_position,
                prepare_position: request.prepare_position,
                events,
                next_commit_position: next,
                next_prepare_position: next,
                result: ReadAllResult::Success,
                error: None,
            },
        ));
    }

    fn subscribe(&mut self, frame: &Frame, out: &mut Vec<Frame>) {
        let request: SubscribeToStream =
            codec::decode(&frame.payload).expect("decode SubscribeToStream");
        self.subscribers
            .push((frame.correlation_id, request.event_stream_id.clone()));
        let last_event_number = self
            .streams
            .get(&request.event_stream_id)
            .filter(|records| !records.is_empty())
            .map(|records| records.len() as i64 - 1);
        out.push(reply(
            Command::SubscriptionConfirmation,
            frame.correlation_id,
            &SubscriptionConfirmation {
                last_commit_position: self.log.len() as i64,
                last_event_number,
            },
        ));
    }

    fn unsubscribe(&mut self, frame: &Frame, out: &mut Vec<Frame>) {
        self.subscribers.retain(|(id, _)| *id != frame.correlation_id);
        out.push(reply(
            Command::SubscriptionDropped,
            frame.correlation_id,
            &SubscriptionDropped {
                reason: SubscriptionDropReason::Unsubscribed,
            },
        ));
    }
}
