//! DIPC Server
//!
//! This crate provides the serving side of a DIPC connection: a handler
//! table keyed by method name plus a per-connection serve loop.
//!
//! # Overview
//!
//! Register handlers with [`RpcServer::on`], then hand each connected byte
//! stream to [`RpcServer::serve`]. The loop decodes frames as they arrive,
//! dispatches Requests and Events to handlers in strict receive order, and
//! writes a Response frame for every Request, including protocol-level
//! failures (parse errors, invalid shapes, unknown methods) and contained
//! handler panics. Events run their handler but never produce a reply.
//!
//! Connections are independent: `serve` can run concurrently for any number
//! of streams, and a handler that blocks stalls only its own connection.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dipc_common::transport::TcpServer;
//! use dipc_server::RpcServer;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> dipc_common::Result<()> {
//!     let mut server = RpcServer::new();
//!     server.on("ping", |_params| async { Ok(json!({"pong": true})) });
//!
//!     let server = Arc::new(server);
//!     let listener = TcpServer::new("127.0.0.1:34567").await?;
//!     listener
//!         .run_with(move |stream| {
//!             let server = server.clone();
//!             async move {
//!                 if let Err(e) = server.serve(stream).await {
//!                     tracing::warn!(error = %e, "connection ended with error");
//!                 }
//!             }
//!         })
//!         .await
//! }
//! ```

pub mod server;

pub use server::RpcServer;
