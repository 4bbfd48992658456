use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use dipc_common::protocol::decoder::FrameDecoder;
use dipc_common::protocol::envelope;
use dipc_common::protocol::error::{DipcError, Result, RpcError, RpcOutcome};
use dipc_common::protocol::frame::{self, FrameHeader, MsgType};

/// Read chunk size for the serve loop
const RECV_BUF_SIZE: usize = 4096;

type Handler = Box<dyn Fn(Value) -> BoxFuture<'static, RpcOutcome> + Send + Sync>;

/// RPC server: a method-name handler table plus a per-connection serve loop.
///
/// Handlers are registered up front with [`on`](RpcServer::on); afterwards
/// [`serve`](RpcServer::serve) can be called once per connected stream, and
/// concurrently for different streams, since connections are independent.
///
/// On a single connection, frames are processed strictly in receive order by
/// one task, so handlers never run concurrently against each other there; a
/// handler that sleeps blocks only its own connection.
///
/// # Example
///
/// ```no_run
/// use dipc_server::RpcServer;
/// use serde_json::json;
///
/// # async fn example(stream: tokio::net::TcpStream) -> dipc_common::Result<()> {
/// let mut server = RpcServer::new();
/// server.on("ping", |_params| async { Ok(json!({"pong": true})) });
///
/// server.serve(stream).await
/// # }
/// ```
pub struct RpcServer {
    handlers: HashMap<String, Handler>,
}

impl RpcServer {
    pub fn new() -> RpcServer {
        RpcServer {
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for `method`, replacing any previous one.
    ///
    /// The handler receives the request's `params` object (`{}` when the
    /// request carried none) and produces the call outcome. Returning an
    /// `Err` sends that error to the caller; a panic inside the handler is
    /// contained and surfaces as `INTERNAL_ERROR`.
    pub fn on<F, Fut>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RpcOutcome> + Send + 'static,
    {
        self.handlers
            .insert(method.into(), Box::new(move |params| handler(params).boxed()));
    }

    /// Serves one connection until the peer closes it.
    ///
    /// The server owns `stream` for the duration of the call and shuts it
    /// down on exit. Returns `Ok(())` on orderly EOF; a failed response send
    /// terminates the loop with the underlying error.
    pub async fn serve<S>(&self, mut stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let result = self.serve_loop(&mut stream).await;
        let _ = stream.shutdown().await;
        result
    }

    async fn serve_loop<S>(&self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; RECV_BUF_SIZE];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!("peer closed connection");
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "recv failed");
                    return Ok(());
                }
            };

            for frame in decoder.feed(&buf[..n]) {
                let msg_type = match MsgType::from_u8(frame.header.msg_type) {
                    Some(MsgType::Request) => MsgType::Request,
                    Some(MsgType::Event) => MsgType::Event,
                    // Responses have no business arriving here.
                    _ => continue,
                };

                let request_id = frame.header.request_id;
                if msg_type == MsgType::Request && request_id == 0 {
                    continue;
                }

                let outcome = match envelope::parse_request_body(&frame.body) {
                    Ok(request) => {
                        tracing::debug!(method = %request.method, request_id, "dispatching");
                        self.dispatch(&request.method, request.params).await
                    }
                    Err(error) => Err(error),
                };

                // Events trigger the handler but never produce a frame back,
                // whatever the outcome.
                if msg_type == MsgType::Event {
                    continue;
                }

                self.send_response(stream, request_id, &outcome).await?;
            }
        }
    }

    /// Looks up and runs the handler for `method`.
    ///
    /// Unknown methods map to `METHOD_NOT_FOUND`; a panicking handler is
    /// caught and mapped to `INTERNAL_ERROR` so one bad request cannot take
    /// down the connection.
    async fn dispatch(&self, method: &str, params: Value) -> RpcOutcome {
        let handler = match self.handlers.get(method) {
            Some(handler) => handler,
            None => return Err(RpcError::method_not_found()),
        };

        match AssertUnwindSafe(handler(params)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_panic) => {
                tracing::warn!(method, "handler panicked");
                Err(RpcError::internal_error())
            }
        }
    }

    async fn send_response<S>(
        &self,
        stream: &mut S,
        request_id: u64,
        outcome: &RpcOutcome,
    ) -> Result<()>
    where
        S: AsyncWrite + Unpin + Send,
    {
        let body = envelope::make_response_body(outcome);
        let bytes = frame::encode(
            &FrameHeader::response(request_id),
            body.to_string().as_bytes(),
        );

        stream
            .write_all(&bytes)
            .await
            .map_err(|e| DipcError::Connection(format!("Failed to send response: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| DipcError::Connection(format!("Failed to flush response: {}", e)))?;

        Ok(())
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}
