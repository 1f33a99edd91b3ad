//! Reassembly of length-prefixed frames from an arbitrary byte stream.

use bytes::{Buf, BytesMut};

use super::{Frame, FrameError, HEADER_LENGTH, LENGTH_PREFIX};

/// Accumulates socket reads and yields complete frames in arrival order.
///
/// Chunks may split a frame anywhere (inside the length prefix, the header,
/// or the payload) and may carry several frames back-to-back; the output is
/// the same frames, same bytes, same order, however the stream is segmented.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
}

impl FrameAssembler {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Feed one chunk and collect every frame it completes.
    ///
    /// # Errors
    /// Returns [`FrameError::LengthBelowHeader`] when a declared length
    /// cannot hold the frame header; the connection must be closed.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.try_next()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_next(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < LENGTH_PREFIX {
            return Ok(None);
        }
        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX]);
        let declared = u32::from_le_bytes(prefix) as usize;
        if declared < HEADER_LENGTH {
            return Err(FrameError::LengthBelowHeader(declared));
        }
        // A frame is complete only once all declared bytes have accumulated.
        if self.buf.len() < LENGTH_PREFIX + declared {
            return Ok(None);
        }
        self.buf.advance(LENGTH_PREFIX);
        let body = self.buf.split_to(declared).freeze();
        Frame::parse_body(body).map(Some)
    }
}
