use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use dipc_common::protocol::decoder::FrameDecoder;
use dipc_common::protocol::envelope;
use dipc_common::protocol::error::{DipcError, RpcError, RpcOutcome};
use dipc_common::protocol::frame::{self, Frame, FrameHeader, MsgType};

/// Read chunk size for the receiver task
const RECV_BUF_SIZE: usize = 4096;

// Connection lifecycle. Transitions only move forward; STOPPED is terminal.
const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// RPC client engine for one connection.
///
/// Multiplexes any number of concurrent [`call`](RpcClient::call)s over a
/// single byte stream. A background receiver task decodes incoming frames
/// and routes each Response to the caller waiting on its request id;
/// responses may complete in any order relative to call issue order.
///
/// Every call resolves exactly once, with one of: the server's outcome, a
/// local `TIMEOUT`, or `CONNECTION_LOST` (covering send failures and
/// connection teardown). A response that arrives after its caller already
/// timed out finds no pending entry and is dropped silently.
///
/// # Example
///
/// ```no_run
/// use dipc_client::RpcClient;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = dipc_common::transport::connect("127.0.0.1:34567").await?;
/// let client = RpcClient::new(stream);
/// client.start()?;
///
/// let data = client.call("add", json!({"a": 1, "b": 2}), 2000).await?;
/// println!("sum = {}", data["sum"]);
///
/// client.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct RpcClient {
    shared: Arc<Shared>,
    /// Read half, handed to the receiver task by `start`.
    reader: Mutex<Option<BoxedReader>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    /// Write half behind the send mutex: every frame goes out as a single
    /// `write_all` under this lock so concurrent callers cannot interleave
    /// frames. Taken (`None`) once `stop` has closed the stream.
    writer: AsyncMutex<Option<BoxedWriter>>,
    /// Pending table: request id -> completion slot of the waiting caller.
    ///
    /// An entry is removed under this lock as the single claim point of its
    /// completion; the outcome is published on the oneshot after the lock is
    /// released. Whichever of response / timeout / connection-loss removes
    /// the entry first wins, and the losers see `None`.
    pending: Mutex<HashMap<u64, oneshot::Sender<RpcOutcome>>>,
    next_id: AtomicU64,
    state: AtomicU8,
    shutdown_tx: watch::Sender<bool>,
}

impl Shared {
    /// Resolves the pending entry for `request_id`, if it still exists.
    ///
    /// Returns false when the entry is gone, meaning another completion path
    /// won the race; the caller drops its outcome in that case.
    fn complete(&self, request_id: u64, outcome: RpcOutcome) -> bool {
        let entry = self.pending.lock().remove(&request_id);
        match entry {
            Some(slot) => {
                // Receiver may have given up (call future dropped); the
                // entry was still ours to consume.
                let _ = slot.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drains the pending table and fails every entry with `error`.
    fn fail_all(&self, error: RpcError) {
        let drained: Vec<(u64, oneshot::Sender<RpcOutcome>)> =
            self.pending.lock().drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "failing all pending calls");
        }
        for (_, slot) in drained {
            let _ = slot.send(Err(error.clone()));
        }
    }

    /// Sends one encoded frame as a contiguous write under the send mutex.
    async fn send_all(&self, bytes: &[u8]) -> Result<(), DipcError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(DipcError::NotConnected)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl RpcClient {
    /// Wraps a connected byte stream. The client owns the stream from here
    /// on; [`stop`](RpcClient::stop) is the closer.
    pub fn new<S>(stream: S) -> RpcClient
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (shutdown_tx, _) = watch::channel(false);

        RpcClient {
            shared: Arc::new(Shared {
                writer: AsyncMutex::new(Some(Box::new(writer))),
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                state: AtomicU8::new(IDLE),
                shutdown_tx,
            }),
            reader: Mutex::new(Some(Box::new(reader))),
            recv_task: Mutex::new(None),
        }
    }

    /// Launches the background receiver task.
    ///
    /// Idempotent while running; fails once the connection has been stopped.
    pub fn start(&self) -> Result<(), RpcError> {
        match self.shared.state.compare_exchange(
            IDLE,
            RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(RUNNING) => return Ok(()),
            Err(_) => return Err(RpcError::connection_lost("not_connected")),
        }

        let reader = match self.reader.lock().take() {
            Some(reader) => reader,
            None => {
                self.shared.state.store(STOPPED, Ordering::Release);
                return Err(RpcError::connection_lost("not_connected"));
            }
        };

        let shared = self.shared.clone();
        let shutdown_rx = self.shared.shutdown_tx.subscribe();
        let handle = tokio::spawn(recv_loop(shared, reader, shutdown_rx));
        *self.recv_task.lock() = Some(handle);

        Ok(())
    }

    /// Shuts down the connection and joins the receiver.
    ///
    /// Any still-pending calls are failed with `CONNECTION_LOST`. Idempotent;
    /// a second `stop` is a no-op.
    pub async fn stop(&self) {
        // Never started: nothing to tear down.
        if self
            .shared
            .state
            .compare_exchange(IDLE, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return;
        }

        let initiated = self
            .shared
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !initiated && self.shared.state.load(Ordering::Acquire) == STOPPING {
            // Another stop() owns the teardown.
            return;
        }
        // Either this call won Running -> Stopping, or the receiver already
        // exited on its own (Stopped); close out whatever remains.

        let _ = self.shared.shutdown_tx.send(true);

        {
            let mut guard = self.shared.writer.lock().await;
            if let Some(mut writer) = guard.take() {
                let _ = writer.shutdown().await;
            }
        }

        let task = self.recv_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.shared
            .fail_all(RpcError::connection_lost("connection_lost"));
        self.shared.state.store(STOPPED, Ordering::Release);
    }

    /// Whether the receiver task is live and calls can be issued.
    pub fn is_running(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == RUNNING
    }

    /// Calls `method` and waits up to `timeout_ms` for the response.
    ///
    /// Returns the server's outcome, or `Err(TIMEOUT)` when the local
    /// deadline elapses first (the request is not cancelled on the peer; a
    /// late response is dropped), or `Err(CONNECTION_LOST)` when the send
    /// fails or the connection goes away while waiting. A `timeout_ms` of 0
    /// is treated as 1.
    pub async fn call(&self, method: &str, params: Value, timeout_ms: u64) -> RpcOutcome {
        if !self.is_running() {
            return Err(RpcError::connection_lost("not_connected"));
        }

        let request_id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (slot, mut completed) = oneshot::channel();
        self.shared.pending.lock().insert(request_id, slot);

        let body = envelope::make_request_body(method, &params);
        let bytes = frame::encode(&FrameHeader::request(request_id), body.to_string().as_bytes());

        if let Err(e) = self.shared.send_all(&bytes).await {
            tracing::debug!(request_id, error = %e, "send failed");
            self.shared
                .complete(request_id, Err(RpcError::connection_lost("send_failed")));
            return wait_completed(completed).await;
        }

        let timeout = Duration::from_millis(timeout_ms.max(1));
        match tokio::time::timeout(timeout, &mut completed).await {
            Ok(Ok(outcome)) => outcome,
            // Slot dropped without a publish; only teardown does that.
            Ok(Err(_)) => Err(RpcError::connection_lost("connection_lost")),
            Err(_elapsed) => {
                if self.shared.complete(request_id, Err(RpcError::timeout())) {
                    Err(RpcError::timeout())
                } else {
                    // A response or connection-loss won the race window;
                    // take the outcome it published.
                    wait_completed(completed).await
                }
            }
        }
    }

    /// Sends a fire-and-forget Event frame (request id 0).
    ///
    /// Returns whether the send succeeded; never waits for a reply and the
    /// server sends none.
    pub async fn notify(&self, method: &str, params: Value) -> bool {
        if !self.is_running() {
            return false;
        }

        let body = envelope::make_request_body(method, &params);
        let bytes = frame::encode(&FrameHeader::event(), body.to_string().as_bytes());
        self.shared.send_all(&bytes).await.is_ok()
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        // Best-effort stop: wake and detach the receiver; dropping the
        // pending slots fails any remaining waiters.
        let _ = self.shared.shutdown_tx.send(true);
        if let Some(task) = self.recv_task.lock().take() {
            task.abort();
        }
    }
}

async fn wait_completed(completed: oneshot::Receiver<RpcOutcome>) -> RpcOutcome {
    match completed.await {
        Ok(outcome) => outcome,
        Err(_) => Err(RpcError::connection_lost("connection_lost")),
    }
}

/// Receiver task: reads until EOF/error/shutdown, decodes frames, and routes
/// responses to their pending callers.
async fn recv_loop(
    shared: Arc<Shared>,
    mut reader: BoxedReader,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; RECV_BUF_SIZE];

    loop {
        let n = tokio::select! {
            _ = shutdown_rx.changed() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("peer closed connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "recv failed");
                    break;
                }
            },
        };

        for frame in decoder.feed(&buf[..n]) {
            route_frame(&shared, frame);
        }
    }

    shared.fail_all(RpcError::connection_lost("connection_lost"));
    // Receiver died on its own; stop() finalizes the state otherwise.
    let _ = shared
        .state
        .compare_exchange(RUNNING, STOPPED, Ordering::AcqRel, Ordering::Acquire);
}

/// Routes one decoded frame. Only Response frames with a nonzero request id
/// matter on the client; everything else is dropped.
fn route_frame(shared: &Shared, frame: Frame) {
    if MsgType::from_u8(frame.header.msg_type) != Some(MsgType::Response) {
        return;
    }
    if frame.header.request_id == 0 {
        return;
    }

    let outcome = envelope::parse_response_body(&frame.body);
    if !shared.complete(frame.header.request_id, outcome) {
        // Caller already timed out or the connection was torn down.
        tracing::debug!(
            request_id = frame.header.request_id,
            "dropping response with no pending call"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::DuplexStream;

    /// Frame-at-a-time reader for the far end of a duplex pair. Keeps any
    /// extra frames decoded from a coalesced read for the next call.
    #[derive(Default)]
    struct FrameReader {
        decoder: FrameDecoder,
        queue: Vec<Frame>,
    }

    impl FrameReader {
        async fn next(&mut self, stream: &mut DuplexStream) -> Frame {
            let mut buf = vec![0u8; RECV_BUF_SIZE];
            loop {
                if !self.queue.is_empty() {
                    return self.queue.remove(0);
                }
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "peer closed before a frame arrived");
                self.queue.extend(self.decoder.feed(&buf[..n]));
            }
        }
    }

    async fn write_response(stream: &mut DuplexStream, request_id: u64, outcome: &RpcOutcome) {
        let body = envelope::make_response_body(outcome);
        let bytes = frame::encode(
            &FrameHeader::response(request_id),
            body.to_string().as_bytes(),
        );
        stream.write_all(&bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_call_before_start_is_not_connected() {
        let (near, _far) = tokio::io::duplex(1024);
        let client = RpcClient::new(near);

        let err = client.call("ping", json!({}), 100).await.unwrap_err();
        assert_eq!(err.code, dipc_common::protocol::error::CONNECTION_LOST);
        assert_eq!(err.message, "not_connected");
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (near, _far) = tokio::io::duplex(1024);
        let client = RpcClient::new(near);

        assert!(!client.is_running());
        assert!(client.start().is_ok());
        assert!(client.is_running());
        assert!(client.start().is_ok());
        assert!(client.is_running());

        client.stop().await;
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn test_start_after_stop_fails() {
        let (near, _far) = tokio::io::duplex(1024);
        let client = RpcClient::new(near);

        client.start().unwrap();
        client.stop().await;
        client.stop().await; // double stop is a no-op

        assert!(client.start().is_err());
        let err = client.call("ping", json!({}), 100).await.unwrap_err();
        assert_eq!(err.message, "not_connected");
    }

    #[tokio::test]
    async fn test_call_delivers_response() {
        let (near, mut far) = tokio::io::duplex(4096);
        let client = RpcClient::new(near);
        client.start().unwrap();

        let responder = tokio::spawn(async move {
            let mut reader = FrameReader::default();
            let request = reader.next(&mut far).await;
            assert_eq!(request.header.msg_type, MsgType::Request as u8);
            assert_eq!(request.header.request_id, 1);

            let parsed = envelope::parse_request_body(&request.body).unwrap();
            assert_eq!(parsed.method, "echo");
            write_response(&mut far, request.header.request_id, &Ok(parsed.params)).await;
            far
        });

        let data = client.call("echo", json!({"x": 7}), 1000).await.unwrap();
        assert_eq!(data, json!({"x": 7}));

        responder.await.unwrap();
        client.stop().await;
    }

    #[tokio::test]
    async fn test_request_ids_are_monotonic_from_one() {
        let (near, mut far) = tokio::io::duplex(4096);
        let client = RpcClient::new(near);
        client.start().unwrap();

        let capture = tokio::spawn(async move {
            let mut reader = FrameReader::default();
            let first = reader.next(&mut far).await;
            let second = reader.next(&mut far).await;
            (first.header.request_id, second.header.request_id, far)
        });

        // No responder: let both calls time out quickly.
        let _ = client.call("a", json!({}), 20).await;
        let _ = client.call("b", json!({}), 20).await;

        let (first, second, _far) = capture.await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_call_times_out_without_response() {
        let (near, _far) = tokio::io::duplex(4096);
        let client = RpcClient::new(near);
        client.start().unwrap();

        let err = client.call("slow", json!({}), 50).await.unwrap_err();
        assert_eq!(err.code, dipc_common::protocol::error::TIMEOUT);
        assert_eq!(err.message, "timeout");

        client.stop().await;
    }

    #[tokio::test]
    async fn test_zero_timeout_is_treated_as_one_ms() {
        let (near, _far) = tokio::io::duplex(4096);
        let client = RpcClient::new(near);
        client.start().unwrap();

        // must still go through the wait path and resolve as a timeout
        let err = client.call("slow", json!({}), 0).await.unwrap_err();
        assert_eq!(err.code, dipc_common::protocol::error::TIMEOUT);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_late_response_is_dropped() {
        let (near, mut far) = tokio::io::duplex(4096);
        let client = RpcClient::new(near);
        client.start().unwrap();

        let responder = tokio::spawn(async move {
            let mut reader = FrameReader::default();

            // First request: answer only after the caller's deadline.
            let first = reader.next(&mut far).await;
            tokio::time::sleep(Duration::from_millis(150)).await;
            write_response(&mut far, first.header.request_id, &Ok(json!({"late": true}))).await;

            // Second request: answer immediately.
            let second = reader.next(&mut far).await;
            write_response(&mut far, second.header.request_id, &Ok(json!({"pong": true}))).await;
            far
        });

        let err = client.call("sleep", json!({"ms": 200}), 50).await.unwrap_err();
        assert_eq!(err.code, dipc_common::protocol::error::TIMEOUT);

        // The late response for the first call must not leak into this one.
        let data = client.call("ping", json!({}), 1000).await.unwrap();
        assert_eq!(data, json!({"pong": true}));

        responder.await.unwrap();
        client.stop().await;
    }

    #[tokio::test]
    async fn test_peer_close_fails_pending_calls() {
        let (near, far) = tokio::io::duplex(4096);
        let client = Arc::new(RpcClient::new(near));
        client.start().unwrap();

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("hang", json!({}), 5_000).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(far);

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.code, dipc_common::protocol::error::CONNECTION_LOST);
        assert_eq!(err.message, "connection_lost");
        assert!(!client.is_running());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_fails_pending_calls() {
        let (near, _far) = tokio::io::duplex(4096);
        let client = Arc::new(RpcClient::new(near));
        client.start().unwrap();

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("hang", json!({}), 5_000).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        client.stop().await;

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.code, dipc_common::protocol::error::CONNECTION_LOST);
    }

    #[tokio::test]
    async fn test_notify_sends_event_frame() {
        let (near, mut far) = tokio::io::duplex(4096);
        let client = RpcClient::new(near);
        client.start().unwrap();

        assert!(client.notify("event_inc", json!({"step": 1})).await);

        let mut reader = FrameReader::default();
        let event = reader.next(&mut far).await;
        assert_eq!(event.header.msg_type, MsgType::Event as u8);
        assert_eq!(event.header.request_id, 0);

        let parsed = envelope::parse_request_body(&event.body).unwrap();
        assert_eq!(parsed.method, "event_inc");
        assert_eq!(parsed.params, json!({"step": 1}));

        client.stop().await;
        assert!(!client.notify("event_inc", json!({})).await);
    }
}
