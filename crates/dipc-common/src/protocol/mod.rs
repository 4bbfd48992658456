//! DIPC Protocol Layer
//!
//! This module defines the wire format and message model shared by the
//! client and server crates:
//!
//! - **[`frame`]**: the fixed 32-byte little-endian frame header, its
//!   encoder/decoder, and structural validation
//! - **[`decoder`]**: the streaming [`FrameDecoder`] that reassembles frames
//!   from arbitrary read chunks
//! - **[`envelope`]**: the JSON body shapes for requests, responses, and
//!   events
//! - **[`error`]**: the stable RPC error codes (1000–1005) plus the
//!   library-level [`DipcError`]
//!
//! # Example
//!
//! ```
//! use dipc_common::protocol::{decoder::FrameDecoder, envelope, frame};
//! use serde_json::json;
//!
//! // Encode a request frame
//! let body = envelope::make_request_body("ping", &json!({}));
//! let bytes = frame::encode(&frame::FrameHeader::request(1), body.to_string().as_bytes());
//!
//! // Feed it back through a streaming decoder
//! let mut decoder = FrameDecoder::new();
//! let frames = decoder.feed(&bytes);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].header.request_id, 1);
//! ```

pub mod decoder;
pub mod envelope;
pub mod error;
pub mod frame;


pub use decoder::FrameDecoder;
pub use envelope::RequestBody;
pub use error::{DipcError, Result, RpcError, RpcOutcome};
pub use frame::{Frame, FrameError, FrameHeader, MsgType, WireCodec};
