//! MCP transport over HTTP + Server-Sent Events.
//!
//! The remote services speak the original MCP SSE binding:
//! 1. `GET <endpoint>` opens a long-lived `text/event-stream`.
//! 2. The first `endpoint` event announces the URL that JSON-RPC messages
//!    must be POSTed to (usually relative and carrying a session id).
//! 3. Responses come back as `message` events on the stream and are matched
//!    to their request by id.
//!
//! One transport is one connection. There is no retry, reconnection or
//! pooling; a failure surfaces to the caller as a [`TransportError`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::types::{JsonRpcRequest, JsonRpcResponse, RequestId};
use super::ServiceEndpoint;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for any single response (stream open, endpoint
/// announcement, JSON-RPC reply).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Transport Error Types
// ============================================================================

/// Errors specific to transport operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The endpoint URL could not be parsed or resolved.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Connection error (refused, DNS, TLS, broken pipe).
    #[error("Connection error: {0}")]
    Connection(String),
    /// Non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    /// No response within the configured timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    /// The event stream ended while a response was still expected.
    #[error("Event stream closed: {0}")]
    StreamClosed(String),
    /// Invalid response from server.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Create a connection error from any error type.
    pub fn connection<E: fmt::Display>(err: E) -> Self {
        TransportError::Connection(err.to_string())
    }

    /// Create a serialization error.
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the SSE transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Time to wait for each response.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Create a new transport config with the given response timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

// ============================================================================
// Transport / Connector Traits
// ============================================================================

/// A single open connection to an MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the matching response.
    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification. No response is awaited.
    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError>;

    /// Release the connection. Further requests fail.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens transports for service endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh connection to `endpoint`.
    async fn connect(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> Result<Box<dyn McpTransport>, TransportError>;
}

/// Production connector: one SSE connection per call.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    config: TransportConfig,
}

impl SseConnector {
    /// Build a connector with its own HTTP client.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn connect(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> Result<Box<dyn McpTransport>, TransportError> {
        let transport =
            SseTransport::connect(self.client.clone(), endpoint.url(), self.config.clone()).await?;
        debug!("[{}] Posting messages to {}", endpoint.name(), transport.message_url());
        Ok(Box::new(transport))
    }
}

// ============================================================================
// SSE Framing
// ============================================================================

/// SSE event structure.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (e.g., "message", "endpoint").
    pub event_type: String,
    /// Event data payload.
    pub data: String,
    /// Event ID.
    pub id: Option<String>,
}

impl SseEvent {
    /// Parse an SSE event from the lines of one frame.
    pub fn parse(input: &str) -> Result<Self, TransportError> {
        let mut event_type = "message".to_string();
        let mut data = String::new();
        let mut has_data = false;
        let mut id = None;

        for line in input.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (key, value) = match line.split_once(':') {
                Some((key, value)) => (key, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match key {
                "event" => event_type = value.to_string(),
                "data" => {
                    if has_data {
                        data.push('\n');
                    }
                    data.push_str(value);
                    has_data = true;
                }
                "id" => id = Some(value.to_string()),
                _ => trace!("Unknown SSE field: {}", key),
            }
        }

        if !has_data {
            return Err(TransportError::InvalidResponse(
                "SSE frame without data".to_string(),
            ));
        }

        Ok(Self {
            event_type,
            data,
            id,
        })
    }
}

/// Incremental decoder turning arbitrary byte chunks into SSE events.
///
/// Frames may be split anywhere, including inside a UTF-8 sequence; a line
/// is only decoded once its terminating newline has arrived.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    frame: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                if let Some(event) = self.finish_frame() {
                    events.push(event);
                }
            } else {
                self.frame.push(line);
            }
        }

        events
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
            self.buffer.clear();
            if !rest.is_empty() {
                self.frame.push(rest);
            }
        }
        self.finish_frame()
    }

    fn finish_frame(&mut self) -> Option<SseEvent> {
        if self.frame.is_empty() {
            return None;
        }
        let text = self.frame.join("\n");
        self.frame.clear();
        // Comment-only frames are keep-alives.
        SseEvent::parse(&text).ok()
    }
}

/// Parse a POST body that may carry the JSON-RPC reply directly, either as
/// plain JSON or as SSE frames.
pub fn parse_json_or_sse_body(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).ok();
    }

    let mut decoder = SseDecoder::default();
    let mut events = decoder.push(trimmed.as_bytes());
    events.extend(decoder.finish());
    events
        .iter()
        .rev()
        .find_map(|event| serde_json::from_str(&event.data).ok())
}

/// Resolve the URL announced by an `endpoint` event against the stream URL.
pub fn resolve_endpoint(base: &Url, announced: &str) -> Result<Url, TransportError> {
    base.join(announced.trim())
        .map_err(|e| TransportError::InvalidUrl(format!("endpoint '{}': {}", announced, e)))
}

// ============================================================================
// Pending Requests
// ============================================================================

#[derive(Debug, Default)]
struct PendingRequests {
    waiters: HashMap<i64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

impl PendingRequests {
    fn register(&mut self, id: i64) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        // After the stream is gone the sender is dropped right away so the
        // receiver fails instead of waiting for the timeout.
        if !self.closed {
            self.waiters.insert(id, tx);
        }
        rx
    }

    fn forget(&mut self, id: i64) {
        self.waiters.remove(&id);
    }

    fn complete(&mut self, response: JsonRpcResponse) {
        let Some(id) = response.id.as_i64() else {
            trace!("Ignoring response with non-numeric id: {:?}", response.id);
            return;
        };
        match self.waiters.remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(response);
            }
            None => trace!("No waiter for response id={}", id),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.waiters.clear();
    }
}

// ============================================================================
// SSE Transport
// ============================================================================

/// Aborts the stream reader when dropped so the connection is released on
/// every exit path.
struct ReaderTask(JoinHandle<()>);

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// SSE transport for one remote MCP server.
pub struct SseTransport {
    client: reqwest::Client,
    stream_url: Url,
    message_url: Url,
    next_id: AtomicI64,
    pending: Arc<Mutex<PendingRequests>>,
    reader: ReaderTask,
    config: TransportConfig,
}

impl fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseTransport")
            .field("stream_url", &self.stream_url.as_str())
            .field("message_url", &self.message_url.as_str())
            .finish()
    }
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its
    /// message endpoint.
    pub async fn connect(
        client: reqwest::Client,
        url: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let stream_url =
            Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;

        info!("Opening SSE stream: {}", stream_url);

        let send = client
            .get(stream_url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(config.timeout, send)
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))?
            .map_err(|e| TransportError::connection(format!("Failed to open SSE stream: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let pending = Arc::new(Mutex::new(PendingRequests::default()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = ReaderTask(tokio::spawn(read_event_stream(
            response.bytes_stream(),
            stream_url.clone(),
            endpoint_tx,
            pending.clone(),
        )));

        let message_url = match tokio::time::timeout(config.timeout, endpoint_rx).await {
            Ok(Ok(resolved)) => resolved?,
            Ok(Err(_)) => {
                return Err(TransportError::StreamClosed(
                    "no endpoint announced".to_string(),
                ))
            }
            Err(_) => return Err(TransportError::Timeout(config.timeout)),
        };

        Ok(Self {
            client,
            stream_url,
            message_url,
            next_id: AtomicI64::new(1),
            pending,
            reader,
            config,
        })
    }

    /// URL JSON-RPC messages are posted to.
    pub fn message_url(&self) -> &Url {
        &self.message_url
    }

    /// POST one message. Returns the reply if the server put it in the body.
    async fn post(&self, message: &JsonRpcRequest) -> Result<Option<JsonRpcResponse>, TransportError> {
        let response = self
            .client
            .post(self.message_url.clone())
            .timeout(self.config.timeout)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.config.timeout)
                } else {
                    TransportError::connection(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(parse_json_or_sse_body(&body).and_then(|value| JsonRpcResponse::from_message(&value)))
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        trace!("Sending SSE request: method={}, id={}", method, id);

        let message = JsonRpcRequest::new(RequestId::Number(id), method, Some(params));
        let waiter = self.pending.lock().await.register(id);

        let inline = match self.post(&message).await {
            Ok(inline) => inline,
            Err(e) => {
                self.pending.lock().await.forget(id);
                return Err(e);
            }
        };
        if let Some(response) = inline.filter(|r| r.id.as_i64() == Some(id)) {
            self.pending.lock().await.forget(id);
            return Ok(response);
        }

        match tokio::time::timeout(self.config.timeout, waiter).await {
            Ok(Ok(response)) => {
                trace!("Received SSE response: id={}", id);
                Ok(response)
            }
            Ok(Err(_)) => Err(TransportError::StreamClosed(format!(
                "no response to '{}'",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.forget(id);
                Err(TransportError::Timeout(self.config.timeout))
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        trace!("Sending SSE notification: method={}", method);
        let message = JsonRpcRequest::notification(method, Some(params));
        self.post(&message).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), TransportError> {
        debug!("Closing SSE transport for: {}", self.stream_url);
        self.reader.0.abort();
        self.pending.lock().await.close();
        Ok(())
    }
}

/// Drain the event stream: resolve the endpoint announcement once, route
/// every `message` event to its waiter.
async fn read_event_stream<S, B, E>(
    stream: S,
    base: Url,
    endpoint_tx: oneshot::Sender<Result<Url, TransportError>>,
    pending: Arc<Mutex<PendingRequests>>,
) where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: fmt::Display + Send,
{
    let mut stream = Box::pin(stream);
    let mut decoder = SseDecoder::default();
    let mut endpoint_tx = Some(endpoint_tx);

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("SSE stream error: {}", e);
                break;
            }
        };

        for event in decoder.push(bytes.as_ref()) {
            match event.event_type.as_str() {
                "endpoint" => match endpoint_tx.take() {
                    Some(tx) => {
                        let _ = tx.send(resolve_endpoint(&base, &event.data));
                    }
                    None => trace!("Ignoring repeated endpoint event"),
                },
                "message" => route_message(&pending, &event.data).await,
                other => trace!("Ignoring SSE event type: {}", other),
            }
        }
    }

    debug!("SSE stream ended: {}", base);
    pending.lock().await.close();
}

async fn route_message(pending: &Mutex<PendingRequests>, data: &str) {
    let message: Value = match serde_json::from_str(data) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping non-JSON SSE message: {}", e);
            return;
        }
    };

    match JsonRpcResponse::from_message(&message) {
        Some(response) => pending.lock().await.complete(response),
        None => trace!("Received notification or server request: {}", message),
    }
}

// ============================================================================
// Tests
// ============================================================================
