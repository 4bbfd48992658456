//! DIPC Transport Layer
//!
//! The core engines in `dipc-client` and `dipc-server` work against any
//! ordered, reliable byte stream: anything implementing tokio's `AsyncRead`
//! and `AsyncWrite` (`write_all` is the whole-buffer send, `read` the
//! chunked receive, `shutdown` the orderly close). No framing or length
//! hints are assumed from the transport; the streaming decoder in
//! [`crate::protocol::decoder`] handles reassembly.
//!
//! This module provides the loopback TCP plumbing used by the demos and
//! integration tests:
//!
//! - **[`connect`]**: resolve-and-connect helper
//! - **[`TcpServer`]**: bind/accept loop that hands each connection to a
//!   serving task

pub mod tcp;

pub use tcp::{connect, TcpServer};
