//! DIPC Common Types and Transport
//!
//! This crate provides the shared protocol and transport infrastructure for
//! DIPC, a point-to-point request/response IPC system layered on a
//! stream-oriented byte transport (typically a loopback TCP socket).
//!
//! # Overview
//!
//! DIPC multiplexes many in-flight requests over one connection. Frames are
//! a fixed 32-byte little-endian header plus a JSON body; responses are
//! correlated to requests by a 64-bit request id, and fire-and-forget events
//! carry id 0. This crate contains everything both sides agree on:
//!
//! - **Protocol Layer**: frame header codec, streaming decoder, message
//!   envelope, and the stable error taxonomy
//! - **Transport Layer**: loopback TCP helpers for connecting and accepting
//!
//! The client engine lives in `dipc-client` and the serving loop in
//! `dipc-server`; both operate on any `AsyncRead + AsyncWrite` byte stream.

pub mod protocol;
pub mod transport;

pub use protocol::*;
