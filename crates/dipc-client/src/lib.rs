//! DIPC Client
//!
//! This crate provides the RPC client engine for one DIPC connection.
//!
//! # Overview
//!
//! [`RpcClient`] wraps a connected byte stream and multiplexes any number of
//! concurrent calls over it. A background receiver task decodes incoming
//! frames and correlates each Response to its caller by request id, so
//! responses may arrive in any order.
//!
//! # Key Properties
//!
//! - **One outcome per call**: every `call` resolves exactly once, with the
//!   server's result, a local timeout, or connection-lost
//! - **Local timeouts**: a timed-out request is not cancelled on the peer;
//!   its late response is dropped silently
//! - **Connection-loss fan-out**: EOF, read errors, and `stop` all fail every
//!   pending call with `CONNECTION_LOST`, so no caller hangs
//! - **Fire-and-forget**: `notify` sends an Event frame and never waits
//!
//! # Usage
//!
//! ```rust,no_run
//! use dipc_client::RpcClient;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = dipc_common::transport::connect("127.0.0.1:34567").await?;
//!
//!     let client = RpcClient::new(stream);
//!     client.start()?;
//!
//!     let data = client.call("ping", json!({}), 1000).await?;
//!     println!("response: {}", data);
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

pub mod client;

pub use client::RpcClient;
