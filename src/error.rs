//! Error types surfaced by connection operations.
//!
//! Business-level failures (wrong expected version, access denied, stream
//! deleted) are reported through the result codes on operation completions,
//! not through these errors. `Error` covers transport, codec, and protocol
//! faults only.

use std::io;

use thiserror::Error;

use crate::{
    codec::CodecError, event::UnpackError, frame::FrameError, results::SubscriptionDropReason,
};

/// Top-level error type for connection operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket-level failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// Malformed frame on the wire.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Payload encode or decode failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A resolved-event envelope could not be unpacked.
    #[error(transparent)]
    Unpack(#[from] UnpackError),
    /// The connection ended before the operation completed.
    #[error("connection closed")]
    ConnectionClosed,
    /// The server dropped a subscription before confirming it.
    #[error("subscription dropped: {0}")]
    SubscriptionDropped(SubscriptionDropReason),
    /// The server answered with a command the operation cannot interpret.
    #[error("unexpected {0} response")]
    UnexpectedCommand(String),
}

/// Result type used throughout the client API.
pub type Result<T, E = Error> = std::result::Result<T, E>;
