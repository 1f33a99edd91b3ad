//! Dedicated writer task feeding the socket from an outbound channel.
//!
//! Operations never touch the socket directly; they enqueue encoded frames
//! and the writer flushes them in order. A write failure cancels the shared
//! shutdown token, which also stops the reader.

use bytes::Bytes;
use log::{error, trace};
use tokio::{io::AsyncWriteExt, net::tcp::OwnedWriteHalf, sync::mpsc};
use tokio_util::sync::CancellationToken;

/// Encoded frames queued ahead of the socket.
pub(crate) const OUTBOUND_QUEUE_DEPTH: usize = 512;

pub(crate) async fn run_writer(
    mut socket: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break,
            message = outbound.recv() => {
                let Some(bytes) = message else { break };
                if let Err(e) = socket.write_all(&bytes).await {
                    error!("outbound write failed: {e}");
                    shutdown.cancel();
                    break;
                }
                trace!("wrote {} bytes", bytes.len());
            }
        }
    }
}
