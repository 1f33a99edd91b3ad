//! Wire frames and the transport that reassembles them from a byte stream.

mod assembler;

pub use assembler::FrameAssembler;


use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::{
    command::Command,
    correlation::CorrelationId,
    credentials::{Credentials, CredentialsError},
};

/// Bytes occupied by the length prefix.
pub const LENGTH_PREFIX: usize = 4;
/// Bytes occupied by the correlation identifier.
pub const CORRELATION_ID_LENGTH: usize = 16;
/// Command byte + flags byte + correlation identifier.
pub const HEADER_LENGTH: usize = 1 + 1 + CORRELATION_ID_LENGTH;

/// Flag bit marking an auth block between the header and the payload.
pub const FLAG_AUTHENTICATED: u8 = 0x01;
/// No flag bits set.
pub const FLAGS_NONE: u8 = 0x00;

/// Errors raised by frame encoding, parsing, and reassembly.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The declared length cannot hold the fixed header. Fatal protocol
    /// violation: the connection must be closed.
    #[error("declared frame length {0} is below the {HEADER_LENGTH}-byte header minimum")]
    LengthBelowHeader(usize),
    /// The frame does not fit the 32-bit length prefix.
    #[error("frame length {0} exceeds the 32-bit length prefix")]
    TooLarge(usize),
    /// The auth flag is set but the auth block is truncated or malformed.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

/// One complete length-prefixed unit of the wire protocol.
///
/// Layout on the wire: 4-byte little-endian length (excluding itself),
/// command byte, flags byte, 16-byte correlation identifier, an auth block
/// when the auth flag is set, then the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub flags: u8,
    pub correlation_id: CorrelationId,
    /// Present exactly when the auth flag is set.
    pub credentials: Option<Credentials>,
    pub payload: Bytes,
}

impl Frame {
    /// Build an outbound frame without credentials.
    #[must_use]
    pub fn new(command: Command, correlation_id: CorrelationId, payload: Bytes) -> Self {
        Self {
            command: command.into(),
            flags: FLAGS_NONE,
            correlation_id,
            credentials: None,
            payload,
        }
    }

    /// Attach or clear credentials, keeping the auth flag consistent.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.flags = if credentials.is_some() {
            self.flags | FLAG_AUTHENTICATED
        } else {
            self.flags & !FLAG_AUTHENTICATED
        };
        self.credentials = credentials;
        self
    }

    /// Encode the frame, length prefix included.
    ///
    /// # Errors
    /// Returns an error if a credential field exceeds the auth block's
    /// single-byte length prefix, or the frame exceeds the length prefix.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let auth_len = self.credentials.as_ref().map_or(0, Credentials::encoded_len);
        let declared = HEADER_LENGTH + auth_len + self.payload.len();
        let prefix = u32::try_from(declared).map_err(|_| FrameError::TooLarge(declared))?;

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + declared);
        buf.put_u32_le(prefix);
        buf.put_u8(self.command);
        buf.put_u8(self.flags);
        buf.put_slice(self.correlation_id.as_bytes());
        if let Some(credentials) = &self.credentials {
            credentials.encode(&mut buf)?;
        }
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parse one frame body (everything after the length prefix).
    pub(crate) fn parse_body(mut body: Bytes) -> Result<Self, FrameError> {
        if body.len() < HEADER_LENGTH {
            return Err(FrameError::LengthBelowHeader(body.len()));
        }
        let command = body[0];
        let flags = body[1];
        let mut id = [0u8; CORRELATION_ID_LENGTH];
        id.copy_from_slice(&body[2..HEADER_LENGTH]);
        body.advance(HEADER_LENGTH);

        let credentials = if flags & FLAG_AUTHENTICATED == 0 {
            None
        } else {
            let (credentials, consumed) = Credentials::parse(&body)?;
            body.advance(consumed);
            Some(credentials)
        };

        Ok(Self {
            command,
            flags,
            correlation_id: CorrelationId::from_bytes(id),
            credentials,
            payload: body,
        })
    }
}
