//! Streaming frame decoder.
//!
//! A transport only delivers "some bytes": a frame may arrive split across
//! several reads, and one read may carry several frames. [`FrameDecoder`]
//! carries a buffer across [`feed`](FrameDecoder::feed) calls and emits
//! whole frames as soon as they are complete, independent of how the byte
//! stream was chunked.

use crate::protocol::frame::{self, Frame, HEADER_LEN};

/// Incremental decoder for a stream of DIPC frames.
///
/// # Framing errors
///
/// When a buffered header fails validation the stream is unrecoverable:
/// there is no way to resynchronize on frame boundaries. `feed` clears the
/// internal buffer and returns the frames completed so far in that call
/// (possibly none). The caller is expected to drop the connection; the
/// decoder itself starts fresh on the next `feed`.
///
/// An empty return therefore means either "need more bytes" or "framing
/// error"; callers distinguish the two by observing transport EOF.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder::default()
    }

    /// Appends `data` to the internal buffer and drains every complete frame.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if data.is_empty() {
            return frames;
        }

        self.buf.extend_from_slice(data);

        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }

            let header = match frame::decode_header(&self.buf) {
                Some(header) => header,
                None => break,
            };

            if let Err(reason) = frame::validate(&header) {
                tracing::warn!(%reason, "invalid frame header, discarding buffer");
                self.buf.clear();
                return frames;
            }

            let total = HEADER_LEN + header.body_len as usize;
            if self.buf.len() < total {
                break;
            }

            let body = self.buf[HEADER_LEN..total].to_vec();
            frames.push(Frame { header, body });
            self.buf.drain(..total);
        }

        frames
    }

    /// Discards any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes buffered while waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
