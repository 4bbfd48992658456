//! Demo caller: connects to the `worker` example and exercises the client.
//!
//! Start the worker first:
//!   cargo run -p dipc-server --example worker
//! then:
//!   cargo run -p dipc-client --example parent

use anyhow::Result;
use serde_json::json;

use dipc_client::RpcClient;

const ADDR: &str = "127.0.0.1:34567";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let stream = dipc_common::transport::connect(ADDR).await?;
    let client = RpcClient::new(stream);
    client.start()?;

    match client.call("ping", json!({}), 1000).await {
        Ok(data) => println!("ping -> {}", data),
        Err(e) => println!("ping failed: {}", e),
    }

    match client.call("add", json!({"a": 1, "b": 2}), 1000).await {
        Ok(data) => println!("add(1, 2) -> {}", data),
        Err(e) => println!("add failed: {}", e),
    }

    // deliberately undersized budget: the worker sleeps 2s, we wait 500ms
    match client.call("sleep", json!({"ms": 2000}), 500).await {
        Ok(data) => println!("sleep -> {}", data),
        Err(e) => println!("sleep failed as expected: {}", e),
    }

    if client.notify("event_inc", json!({})).await {
        println!("event_inc notified (no reply expected)");
    }

    client.stop().await;
    Ok(())
}
