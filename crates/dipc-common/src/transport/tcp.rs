use std::sync::Arc;

use tokio::net::{lookup_host, TcpListener, TcpStream};

use crate::protocol::error::{DipcError, Result};

/// Connects to a remote endpoint.
///
/// `addr` may resolve to several candidates (e.g. a hostname with both v4
/// and v6 entries); each is tried in resolver order until one accepts.
///
/// # Arguments
///
/// * `addr` - The address to connect to (e.g., "127.0.0.1:34567")
pub async fn connect(addr: &str) -> Result<TcpStream> {
    let candidates = lookup_host(addr)
        .await
        .map_err(|e| DipcError::Connection(format!("cannot resolve '{}': {}", addr, e)))?;

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%candidate, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    // Either every candidate refused, or resolution produced none at all.
    Err(match last_err {
        Some(e) => DipcError::Io(e),
        None => DipcError::Connection(format!("'{}' resolved to no addresses", addr)),
    })
}

/// Accepting side of a loopback TCP transport.
///
/// Accepts connections in a loop and hands each connected stream to a
/// caller-supplied task, so the serving code owns the stream for the
/// connection's lifetime.
///
/// # Example
///
/// ```no_run
/// use dipc_common::transport::TcpServer;
///
/// # async fn example() -> dipc_common::Result<()> {
/// let server = TcpServer::new("127.0.0.1:0").await?;
/// server
///     .run_with(|stream| async move {
///         // serve the connection, e.g. RpcServer::serve(stream)
///         drop(stream);
///     })
///     .await
/// # }
/// ```
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Binds a listener on `bind_addr` (port 0 picks an ephemeral port).
    pub async fn new(bind_addr: &str) -> Result<TcpServer> {
        match TcpListener::bind(bind_addr).await {
            Ok(listener) => Ok(TcpServer { listener }),
            Err(e) => Err(DipcError::Connection(format!(
                "bind to {} failed: {}",
                bind_addr, e
            ))),
        }
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, spawning `on_conn` for each.
    ///
    /// Each connection gets its own task; one blocked connection does not
    /// stall the others.
    pub async fn run_with<F, Fut>(&self, on_conn: F) -> Result<()>
    where
        F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let on_conn = Arc::new(on_conn);

        loop {
            let (stream, peer_addr) = self
                .listener
                .accept()
                .await
                .map_err(|e| DipcError::Connection(format!("accept failed: {}", e)))?;

            tracing::info!(%peer_addr, "connection established");

            let on_conn = on_conn.clone();
            tokio::spawn(async move {
                on_conn(stream).await;
            });
        }
    }
}
