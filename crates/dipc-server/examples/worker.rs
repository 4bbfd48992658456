//! Loopback worker: serves ping/add/sleep/event_inc until killed.
//!
//! Run with:
//!   cargo run -p dipc-server --example worker
//! then point the `parent` example from dipc-client at it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use dipc_common::protocol::error::RpcError;
use dipc_common::transport::TcpServer;
use dipc_server::RpcServer;

const ADDR: &str = "127.0.0.1:34567";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let event_count = Arc::new(AtomicUsize::new(0));

    let mut server = RpcServer::new();
    server.on("ping", |_params| async { Ok(json!({"pong": true})) });
    server.on("add", |params| async move {
        let a = params.get("a").and_then(|v| v.as_i64());
        let b = params.get("b").and_then(|v| v.as_i64());
        match (a, b) {
            (Some(a), Some(b)) => Ok(json!({"sum": a + b})),
            _ => Err(RpcError::invalid_request("add expects {a:int,b:int}")),
        }
    });
    server.on("sleep", |params| async move {
        let ms = params.get("ms").and_then(|v| v.as_u64()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(json!({"slept_ms": ms}))
    });
    server.on("event_inc", move |_params| {
        let event_count = event_count.clone();
        async move {
            let count = event_count.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!(count, "event_inc");
            Ok(json!({}))
        }
    });

    let server = Arc::new(server);
    let listener = TcpServer::new(ADDR).await?;
    tracing::info!(addr = %listener.local_addr()?, "worker listening");

    listener
        .run_with(move |stream| {
            let server = server.clone();
            async move {
                if let Err(e) = server.serve(stream).await {
                    tracing::warn!(error = %e, "connection ended with error");
                }
            }
        })
        .await?;

    Ok(())
}
