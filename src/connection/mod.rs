//! TCP session owning the socket and routing responses by correlation id.
//!
//! The connection is the only component touching the socket. It splits the
//! stream into a reader task (frame reassembly + dispatch) and a writer task
//! (ordered frame writes), joined by a cancellation token. Public operations
//! register a handler under a fresh correlation identifier, write one frame,
//! and resolve when the matching response arrives.

mod operations;
mod reader;
mod registry;
mod subscription;
mod writer;

pub use operations::{AllSlice, StreamSlice};
pub use subscription::{Subscription, SubscriptionNotification};

use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;

use self::registry::{PendingOp, PendingRegistry};
use crate::{
    command::Command,
    correlation::CorrelationId,
    credentials::Credentials,
    error::{Error, Result},
    frame::Frame,
};

/// Hook invoked when the socket reports an error, before the connection ends.
pub type ErrorHandler = Arc<dyn Fn(&std::io::Error) + Send + Sync>;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 1113;

/// Builder for [`Connection`].
#[derive(Clone)]
pub struct ConnectionBuilder {
    host: String,
    port: u16,
    on_error: Option<ErrorHandler>,
}

impl ConnectionBuilder {
    fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            on_error: None,
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Install a hook observing socket errors before the connection ends.
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(&std::io::Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Connect and spawn the session's reader and writer tasks.
    ///
    /// # Errors
    /// Returns an error if the TCP connection cannot be established.
    pub async fn connect(self) -> Result<Connection> {
        let socket = TcpStream::connect((self.host.as_str(), self.port)).await?;
        debug!("connected to {}:{}", self.host, self.port);
        Ok(Connection::spawn(socket, self.on_error))
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self { Self::new() }
}

/// Cheaply cloneable handle to one TCP session.
///
/// Clones share the socket, the pending-operation registry, and the
/// shutdown token; independent connections never share state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    pending: Arc<PendingRegistry>,
    outbound: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) { self.shutdown.cancel(); }
}

impl Connection {
    #[must_use]
    pub fn builder() -> ConnectionBuilder { ConnectionBuilder::new() }

    fn spawn(socket: TcpStream, on_error: Option<ErrorHandler>) -> Self {
        let (read_half, write_half) = socket.into_split();
        let pending = Arc::new(PendingRegistry::default());
        let (outbound_tx, outbound_rx) = mpsc::channel(writer::OUTBOUND_QUEUE_DEPTH);
        let shutdown = CancellationToken::new();

        tokio::spawn(writer::run_writer(write_half, outbound_rx, shutdown.clone()));
        tokio::spawn(reader::run_reader(
            read_half,
            Arc::clone(&pending),
            outbound_tx.clone(),
            shutdown.clone(),
            on_error,
        ));

        Self {
            inner: Arc::new(ConnectionInner {
                pending,
                outbound: outbound_tx,
                shutdown,
            }),
        }
    }

    /// End the session. Pending operations are abandoned: their futures
    /// resolve as [`Error::ConnectionClosed`] without a fabricated response.
    pub fn close(&self) { self.inner.shutdown.cancel(); }

    /// True once the session has ended, locally or by the peer.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.inner.shutdown.is_cancelled() }

    /// Verify liveness: send a ping and await the pong.
    ///
    /// # Errors
    /// Returns an error if the connection closes first or the server answers
    /// with anything other than a pong.
    pub async fn ping(&self, credentials: Option<Credentials>) -> Result<()> {
        let response = self.request(Command::Ping, credentials, Bytes::new()).await?;
        match Command::from_u8(response.command) {
            Some(Command::Pong) => Ok(()),
            _ => Err(Error::UnexpectedCommand(Command::describe(response.command))),
        }
    }

    /// Allocate a correlation id, register `op` under it, and write one
    /// frame. The generic primitive every operation builds on.
    pub(crate) async fn send_message(
        &self,
        command: Command,
        credentials: Option<Credentials>,
        payload: Bytes,
        op: Option<PendingOp>,
    ) -> Result<CorrelationId> {
        let correlation_id = CorrelationId::new();
        self.send_with_id(correlation_id, command, credentials, payload, op)
            .await?;
        Ok(correlation_id)
    }

    /// Write one frame under an existing correlation id (heartbeats,
    /// unsubscribes). Never replaces a registered handler.
    pub(crate) async fn send_with_id(
        &self,
        correlation_id: CorrelationId,
        command: Command,
        credentials: Option<Credentials>,
        payload: Bytes,
        op: Option<PendingOp>,
    ) -> Result<()> {
        let registered = op.is_some();
        if let Some(op) = op {
            self.inner.pending.insert(correlation_id, op);
        }
        let frame = Frame::new(command, correlation_id, payload).with_credentials(credentials);
        let bytes = match frame.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                if registered {
                    self.inner.pending.remove(correlation_id);
                }
                return Err(e.into());
            }
        };
        debug!("outbound {command:?} frame ({correlation_id})");
        if self.inner.outbound.send(bytes).await.is_err() {
            if registered {
                self.inner.pending.remove(correlation_id);
            }
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// One-shot request/response primitive.
    pub(crate) async fn request(
        &self,
        command: Command,
        credentials: Option<Credentials>,
        payload: Bytes,
    ) -> Result<Frame> {
        let (tx, rx) = oneshot::channel();
        self.send_message(command, credentials, payload, Some(PendingOp::OneShot(tx)))
            .await?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }
}
