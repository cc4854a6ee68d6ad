//! End-to-end invocation over the real SSE transport, against an HTTP mock
//! for inline replies and a small TCP server for replies pushed on the
//! event stream.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use scholar_agent::mcp::{
    InvocationResult, InvokeError, RemoteToolClient, ServiceEndpoint, SseConnector, Stage,
    TransportConfig,
};

const ENDPOINT_EVENT: &str = "event: endpoint\ndata: /messages/?session_id=abc\n\n";

fn client(url: String) -> RemoteToolClient {
    let connector = SseConnector::new(TransportConfig::with_timeout(Duration::from_secs(5))).unwrap();
    let endpoint = ServiceEndpoint::new("Crossref", url).unwrap();
    RemoteToolClient::new(endpoint, Arc::new(connector))
}

fn query(text: &str) -> Map<String, Value> {
    let mut arguments = Map::new();
    arguments.insert("query".into(), json!(text));
    arguments.insert("rows".into(), json!(2));
    arguments
}

async fn mock_stream(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sse");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(ENDPOINT_EVENT);
        })
        .await;
}

async fn mock_rpc<'a>(server: &'a MockServer, method: &str, reply: Value) -> httpmock::Mock<'a> {
    let needle = format!("\"method\":\"{}\"", method);
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/messages/")
                .query_param("session_id", "abc")
                .body_contains(needle.as_str());
            then.status(200)
                .header("content-type", "application/json")
                .json_body(reply);
        })
        .await
}

async fn mock_handshake(server: &MockServer) {
    mock_rpc(
        server,
        "initialize",
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "crossref", "version": "1.0" }
            }
        }),
    )
    .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/messages/")
                .body_contains("notifications/initialized");
            then.status(202);
        })
        .await;
}

#[tokio::test]
async fn test_invoke_over_sse() {
    let server = MockServer::start_async().await;
    mock_stream(&server).await;
    mock_handshake(&server).await;
    mock_rpc(
        &server,
        "tools/list",
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": { "tools": [
                { "name": "search_works", "inputSchema": { "type": "object" } },
                { "name": "get_work", "inputSchema": { "type": "object" } }
            ] }
        }),
    )
    .await;
    let call = mock_rpc(
        &server,
        "tools/call",
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": { "content": [
                { "type": "text", "text": "{\"DOI\":\"10.1/a\"}" },
                { "type": "text", "text": "plain note" }
            ] }
        }),
    )
    .await;

    let result = client(server.url("/sse"))
        .invoke("search_works", query("quantum computing"))
        .await
        .unwrap();

    assert_eq!(result.to_json(), json!([{ "DOI": "10.1/a" }, "plain note"]));
    assert!(matches!(result, InvocationResult::Sequence(ref items) if items.len() == 2));
    call.assert_async().await;
}

#[tokio::test]
async fn test_missing_capability_over_sse() {
    let server = MockServer::start_async().await;
    mock_stream(&server).await;
    mock_handshake(&server).await;
    mock_rpc(
        &server,
        "tools/list",
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": { "tools": [{ "name": "searchWorks", "inputSchema": {} }] }
        }),
    )
    .await;
    let call = mock_rpc(&server, "tools/call", json!({ "jsonrpc": "2.0", "id": 3, "result": {} })).await;

    let err = client(server.url("/sse"))
        .invoke("search_works", query("LLM"))
        .await
        .unwrap_err();

    match err {
        InvokeError::CapabilityNotFound { requested, available, .. } => {
            assert_eq!(requested, "search_works");
            assert_eq!(available, vec!["searchWorks".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    call.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_stream_rejected_fails_at_connect() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sse");
            then.status(404).body("not found");
        })
        .await;

    let err = client(server.url("/sse"))
        .invoke("search_works", query("LLM"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::RemoteFailure { stage: Stage::Connect, .. }));
    assert!(err.to_string().starts_with("[Crossref] connect failed"));
}

#[tokio::test]
async fn test_unreachable_host_fails_at_connect() {
    let err = client("http://127.0.0.1:1/sse".to_string())
        .invoke("search_works", query("LLM"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::RemoteFailure { stage: Stage::Connect, .. }));
}

#[tokio::test]
async fn test_stream_without_endpoint_fails_at_connect() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sse");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(": keep-alive\n\n");
        })
        .await;

    let err = client(server.url("/sse"))
        .invoke("search_works", query("LLM"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::RemoteFailure { stage: Stage::Connect, .. }));
}

#[tokio::test]
async fn test_unanswered_initialize_fails_at_handshake() {
    let server = MockServer::start_async().await;
    mock_stream(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/messages/");
            then.status(202);
        })
        .await;

    let err = client(server.url("/sse"))
        .invoke("search_works", query("LLM"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::RemoteFailure { stage: Stage::Handshake, .. }));
}

// ============================================================================
// Streamed replies
// ============================================================================

/// MCP server that keeps the event stream open, answers every POST with
/// `202 Accepted` and pushes the JSON-RPC reply onto the stream afterwards.
/// Frames use CRLF line endings and are interleaved with `: ping` comments.
struct StreamingServer {
    addr: SocketAddr,
    posted: Arc<Mutex<Vec<Value>>>,
}

type SharedStream = Arc<Mutex<Option<UnboundedReceiver<String>>>>;

impl StreamingServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<String>();
        let stream: SharedStream = Arc::new(Mutex::new(Some(events_rx)));
        let posted = Arc::new(Mutex::new(Vec::new()));

        let log = posted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, events_tx.clone(), stream.clone(), log.clone()));
            }
        });

        Self { addr, posted }
    }

    fn url(&self) -> String {
        format!("http://{}/sse", self.addr)
    }

    fn methods(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| message["method"].as_str().map(str::to_string))
            .collect()
    }

    fn last_params(&self, method: &str) -> Option<Value> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|message| message["method"] == method)
            .map(|message| message["params"].clone())
    }
}

async fn serve(
    mut socket: TcpStream,
    events: UnboundedSender<String>,
    stream: SharedStream,
    posted: Arc<Mutex<Vec<Value>>>,
) {
    let Some((head, body)) = read_request(&mut socket).await else {
        return;
    };

    if head.starts_with("GET ") {
        let taken = stream.lock().unwrap().take();
        let Some(mut frames) = taken else {
            return;
        };
        let headers = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\ntransfer-encoding: chunked\r\n\r\n";
        if socket.write_all(headers.as_bytes()).await.is_err() {
            return;
        }
        let announce = ": ping\r\n\r\nevent: endpoint\r\ndata: /messages/?session_id=s1\r\n\r\n";
        if write_chunk(&mut socket, announce).await.is_err() {
            return;
        }
        while let Some(frame) = frames.recv().await {
            // Split every frame across two chunks.
            let (first, second) = frame.split_at(frame.len() / 2);
            if write_chunk(&mut socket, first).await.is_err()
                || write_chunk(&mut socket, second).await.is_err()
            {
                return;
            }
        }
        return;
    }

    let message: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    posted.lock().unwrap().push(message.clone());
    let _ = socket
        .write_all(b"HTTP/1.1 202 Accepted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
        .await;
    let _ = socket.shutdown().await;

    if let Some(reply) = reply_for(&message) {
        let frame = format!(": ping\r\n\r\nevent: message\r\ndata: {}\r\n\r\n", reply);
        let _ = events.send(frame);
    }
}

fn reply_for(message: &Value) -> Option<Value> {
    let id = message.get("id")?.clone();
    let result = match message["method"].as_str()? {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "crossref", "version": "1.0" }
        }),
        "tools/list" => json!({ "tools": [{ "name": "search_works", "inputSchema": { "type": "object" } }] }),
        "tools/call" => json!({ "content": [
            { "type": "text", "text": "{\"DOI\":\"10.1/x\"}" },
            { "type": "text", "text": "plain" }
        ] }),
        _ => return None,
    };
    Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

async fn read_request(socket: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some((head, buf[head_end..head_end + length].to_vec()))
}

async fn write_chunk(socket: &mut TcpStream, data: &str) -> std::io::Result<()> {
    socket
        .write_all(format!("{:x}\r\n{}\r\n", data.len(), data).as_bytes())
        .await?;
    socket.flush().await
}

#[tokio::test]
async fn test_replies_delivered_on_event_stream() {
    let server = StreamingServer::start().await;

    let result = client(server.url())
        .invoke("search_works", query("LLM"))
        .await
        .unwrap();

    assert_eq!(result.to_json(), json!([{ "DOI": "10.1/x" }, "plain"]));
    assert_eq!(
        server.methods(),
        vec!["initialize", "notifications/initialized", "tools/list", "tools/call"]
    );
    assert_eq!(
        server.last_params("tools/call").unwrap(),
        json!({ "name": "search_works", "arguments": { "query": "LLM", "rows": 2 } })
    );
}

#[tokio::test]
async fn test_missing_capability_on_event_stream() {
    let server = StreamingServer::start().await;

    let err = client(server.url())
        .invoke("SearchWorks", query("LLM"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InvokeError::CapabilityNotFound {
            service: "Crossref".to_string(),
            requested: "SearchWorks".to_string(),
            available: vec!["search_works".to_string()],
        }
    );
    assert_eq!(server.methods(), vec!["initialize", "notifications/initialized", "tools/list"]);
}
