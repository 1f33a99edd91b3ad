//! Inbound frame processing and dispatch to pending operations.
//!
//! All frames for a connection pass through this task one at a time, in
//! arrival order, so handler delivery is inherently serialised.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, warn};
use tokio::{io::AsyncReadExt, net::tcp::OwnedReadHalf, sync::mpsc};
use tokio_util::sync::CancellationToken;

use super::{
    ErrorHandler,
    registry::{PendingOp, PendingRegistry},
};
use crate::{
    command::Command,
    frame::{Frame, FrameAssembler},
};

const READ_CHUNK: usize = 8 * 1024;

pub(crate) async fn run_reader(
    mut socket: OwnedReadHalf,
    registry: Arc<PendingRegistry>,
    outbound: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
    on_error: Option<ErrorHandler>,
) {
    let mut assembler = FrameAssembler::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break,
            read = socket.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!("connection closed by peer");
                    break;
                }
                Ok(n) => match assembler.push_bytes(&chunk[..n]) {
                    Ok(frames) => {
                        for frame in frames {
                            dispatch(frame, &registry, &outbound).await;
                        }
                    }
                    // Transport-fatal: a frame violated the header minimum.
                    Err(e) => {
                        error!("closing connection: {e}");
                        break;
                    }
                },
                Err(e) => {
                    if let Some(handler) = &on_error {
                        handler(&e);
                    } else {
                        error!("socket error: {e}");
                    }
                    break;
                }
            },
        }
    }

    // Abandon pending handlers without invoking them; their futures resolve
    // as connection-closed.
    registry.clear();
    shutdown.cancel();
}

async fn dispatch(frame: Frame, registry: &PendingRegistry, outbound: &mpsc::Sender<Bytes>) {
    debug!(
        "inbound {} frame ({} payload bytes)",
        Command::describe(frame.command),
        frame.payload.len()
    );

    if Command::from_u8(frame.command) == Some(Command::HeartbeatRequest) {
        answer_heartbeat(&frame, outbound).await;
        return;
    }

    let id = frame.correlation_id;
    let Some(op) = registry.remove(id) else {
        warn!(
            "discarding {} frame with unknown correlation id {id}",
            Command::describe(frame.command)
        );
        return;
    };

    match op {
        PendingOp::OneShot(tx) => {
            if tx.send(frame).is_err() {
                debug!("response receiver for {id} is gone");
            }
        }
        PendingOp::Subscription(tx) => {
            // Confirmation and appeared events keep the subscription
            // registered; anything else is terminal for this identifier.
            let keep = matches!(
                Command::from_u8(frame.command),
                Some(Command::SubscriptionConfirmation | Command::StreamEventAppeared)
            );
            if tx.send(frame).is_err() {
                warn!("subscription handler for {id} is gone, unhooking");
            } else if keep {
                registry.insert(id, PendingOp::Subscription(tx));
            }
        }
    }
}

/// Heartbeat requests are answered in place, echoing the server's
/// correlation id; no handler is involved.
async fn answer_heartbeat(request: &Frame, outbound: &mpsc::Sender<Bytes>) {
    let reply = Frame::new(
        Command::HeartbeatResponse,
        request.correlation_id,
        Bytes::new(),
    );
    match reply.encode() {
        Ok(bytes) => {
            let _ = outbound.send(bytes).await;
        }
        Err(e) => error!("failed to encode heartbeat response: {e}"),
    }
}
