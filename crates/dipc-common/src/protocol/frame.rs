//! DIPC Wire Format
//!
//! Every message on the wire is a frame: a fixed 32-byte header followed by
//! `body_len` bytes of body. All multi-byte header fields are little-endian
//! regardless of host byte order.
//!
//! # Header Layout
//!
//! ```text
//! offset  size  field
//!      0     4  magic         "DIPC" (0x43504944 LE)
//!      4     2  version       0x0001
//!      6     2  header_len    32
//!      8     4  body_len      0..=8 MiB
//!     12     1  msg_type      1=Request 2=Response 3=Event
//!     13     1  codec         1=Json
//!     14     2  flags         0
//!     16     8  request_id    nonzero for Request/Response, 0 for Event
//!     24     4  reserved      0
//!     28     4  header_crc32  0
//! ```
//!
//! Encoding and validation are split: [`decode_header`] only reads the 32
//! bytes into a [`FrameHeader`] so a streaming decoder can peek at `body_len`
//! cheaply, while [`validate`] checks every invariant and reports a stable
//! reason via [`FrameError`].

use thiserror::Error;

/// Frame magic, "DIPC" as a little-endian u32 (bytes on wire: 44 49 50 43)
pub const MAGIC: u32 = 0x4350_4944;

/// Wire format version
pub const VERSION: u16 = 0x0001;

/// Fixed header size in bytes
pub const HEADER_LEN: usize = 32;

/// Maximum accepted body length (8 MiB)
pub const MAX_BODY_LEN: u32 = 8 * 1024 * 1024;

/// Message kind carried in the header's `msg_type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Request = 1,
    Response = 2,
    Event = 3,
}

impl MsgType {
    /// Decodes a raw `msg_type` byte, `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<MsgType> {
        match value {
            1 => Some(MsgType::Request),
            2 => Some(MsgType::Response),
            3 => Some(MsgType::Event),
            _ => None,
        }
    }
}

/// Body codec carried in the header's `codec` byte.
///
/// Json is the only value accepted at this version; 2 is reserved for a
/// future binary codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireCodec {
    Json = 1,
}

/// Validation failure for a decoded header.
///
/// The `Display` strings are part of the protocol's testable surface and
/// must stay stable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("bad header_len")]
    BadHeaderLen,
    #[error("body_len too large")]
    BodyTooLarge,
    #[error("bad msg_type")]
    BadMsgType,
    #[error("unsupported codec")]
    UnsupportedCodec,
    #[error("flags must be 0")]
    NonZeroFlags,
    #[error("reserved must be 0")]
    NonZeroReserved,
    #[error("crc must be 0")]
    NonZeroCrc,
    #[error("event request_id must be 0")]
    EventRequestId,
    #[error("request_id must be non-zero")]
    ZeroRequestId,
}

/// In-memory image of the 32-byte wire header.
///
/// Fields are kept raw (`msg_type`/`codec` as bytes) so that a header read
/// off the wire can represent invalid values for [`validate`] to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u32,
    pub version: u16,
    pub header_len: u16,
    pub body_len: u32,
    pub msg_type: u8,
    pub codec: u8,
    pub flags: u16,
    pub request_id: u64,
    pub reserved: u32,
    pub header_crc32: u32,
}

impl FrameHeader {
    fn with_type(msg_type: MsgType, request_id: u64) -> FrameHeader {
        FrameHeader {
            magic: MAGIC,
            version: VERSION,
            header_len: HEADER_LEN as u16,
            body_len: 0,
            msg_type: msg_type as u8,
            codec: WireCodec::Json as u8,
            flags: 0,
            request_id,
            reserved: 0,
            header_crc32: 0,
        }
    }

    /// Header for a Request frame with the given (nonzero) id.
    pub fn request(request_id: u64) -> FrameHeader {
        FrameHeader::with_type(MsgType::Request, request_id)
    }

    /// Header for a Response frame correlated to `request_id`.
    pub fn response(request_id: u64) -> FrameHeader {
        FrameHeader::with_type(MsgType::Response, request_id)
    }

    /// Header for a fire-and-forget Event frame (request_id is always 0).
    pub fn event() -> FrameHeader {
        FrameHeader::with_type(MsgType::Event, 0)
    }
}

/// A complete frame: header plus `body_len` bytes of body.
///
/// The body is raw bytes; for the Json codec it is the UTF-8 serialization
/// of an envelope object (see [`crate::protocol::envelope`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Vec<u8>,
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
        bytes[offset + 4],
        bytes[offset + 5],
        bytes[offset + 6],
        bytes[offset + 7],
    ])
}

/// Encodes a frame to wire bytes: 32-byte LE header followed by the body.
///
/// `body_len` is always written from `body.len()`, overriding whatever the
/// caller left in the header, so header and body can never disagree.
pub fn encode(header: &FrameHeader, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&header.magic.to_le_bytes());
    out.extend_from_slice(&header.version.to_le_bytes());
    out.extend_from_slice(&header.header_len.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.push(header.msg_type);
    out.push(header.codec);
    out.extend_from_slice(&header.flags.to_le_bytes());
    out.extend_from_slice(&header.request_id.to_le_bytes());
    out.extend_from_slice(&header.reserved.to_le_bytes());
    out.extend_from_slice(&header.header_crc32.to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Decodes the first 32 bytes of `bytes` into a header.
///
/// Returns `None` when fewer than 32 bytes are available. No semantic
/// validation happens here; call [`validate`] on the result.
pub fn decode_header(bytes: &[u8]) -> Option<FrameHeader> {
    if bytes.len() < HEADER_LEN {
        return None;
    }

    Some(FrameHeader {
        magic: read_u32(bytes, 0),
        version: read_u16(bytes, 4),
        header_len: read_u16(bytes, 6),
        body_len: read_u32(bytes, 8),
        msg_type: bytes[12],
        codec: bytes[13],
        flags: read_u16(bytes, 14),
        request_id: read_u64(bytes, 16),
        reserved: read_u32(bytes, 24),
        header_crc32: read_u32(bytes, 28),
    })
}

/// Checks every header invariant for this protocol version.
pub fn validate(header: &FrameHeader) -> Result<(), FrameError> {
    if header.magic != MAGIC {
        return Err(FrameError::BadMagic);
    }
    if header.version != VERSION {
        return Err(FrameError::UnsupportedVersion);
    }
    if header.header_len != HEADER_LEN as u16 {
        return Err(FrameError::BadHeaderLen);
    }
    if header.body_len > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLarge);
    }

    let msg_type = MsgType::from_u8(header.msg_type).ok_or(FrameError::BadMsgType)?;

    if header.codec != WireCodec::Json as u8 {
        return Err(FrameError::UnsupportedCodec);
    }
    if header.flags != 0 {
        return Err(FrameError::NonZeroFlags);
    }
    if header.reserved != 0 {
        return Err(FrameError::NonZeroReserved);
    }
    if header.header_crc32 != 0 {
        return Err(FrameError::NonZeroCrc);
    }

    match msg_type {
        MsgType::Event => {
            if header.request_id != 0 {
                return Err(FrameError::EventRequestId);
            }
        }
        MsgType::Request | MsgType::Response => {
            if header.request_id == 0 {
                return Err(FrameError::ZeroRequestId);
            }
        }
    }

    Ok(())
}
