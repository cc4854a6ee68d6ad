//! In-memory MCP server for integration testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};

use scholar_agent::mcp::transport::TransportError;
use scholar_agent::mcp::types::*;

/// Point in the connection lifetime where the server breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Connect,
    Initialize,
    ListTools,
    CallTool,
}

/// A mock MCP server for testing.
pub struct MockMcpServer {
    tools: Mutex<Vec<Tool>>,
    results: Mutex<HashMap<String, CallToolResult>>,
    fail_at: Mutex<Option<FailAt>>,
    request_log: Mutex<Vec<(String, Value)>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
}

impl MockMcpServer {
    pub fn new() -> Self {
        Self {
            tools: Mutex::new(Vec::new()),
            results: Mutex::new(HashMap::new()),
            fail_at: Mutex::new(None),
            request_log: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Server exposing `names`, each returning no content until configured.
    pub fn with_tools(names: &[&str]) -> Self {
        let server = Self::new();
        *server.tools.lock().unwrap() = names
            .iter()
            .map(|name| Tool {
                name: name.to_string(),
                description: Some(format!("{} tool", name)),
                input_schema: json!({ "type": "object" }),
            })
            .collect();
        server
    }

    /// Make `tool` answer with the given text items.
    pub fn respond_with_text(self, tool: &str, texts: &[&str]) -> Self {
        let content = texts.iter().map(|t| TextContent::new(*t).into()).collect();
        self.respond_with(
            tool,
            CallToolResult {
                content,
                is_error: None,
            },
        )
    }

    pub fn respond_with(self, tool: &str, result: CallToolResult) -> Self {
        self.results.lock().unwrap().insert(tool.to_string(), result);
        self
    }

    pub fn failing_at(self, stage: FailAt) -> Self {
        *self.fail_at.lock().unwrap() = Some(stage);
        self
    }

    pub fn fails_at(&self, stage: FailAt) -> bool {
        *self.fail_at.lock().unwrap() == Some(stage)
    }

    /// Methods received, in order.
    pub fn methods(&self) -> Vec<String> {
        self.request_log
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Params of the last request with `method`.
    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.request_log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Handle one request or notification.
    pub fn handle(&self, method: &str, params: Value) -> Result<JsonRpcResponse, TransportError> {
        self.request_log
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        let stage = match method {
            "initialize" => Some(FailAt::Initialize),
            "tools/list" => Some(FailAt::ListTools),
            "tools/call" => Some(FailAt::CallTool),
            _ => None,
        };
        if stage.is_some() && *self.fail_at.lock().unwrap() == stage {
            return Err(TransportError::Timeout(std::time::Duration::from_secs(60)));
        }

        let id = RequestId::Number(1);
        let response = match method {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "mock", "version": "1.0.0" }
                }),
            ),
            "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let tools = self.tools.lock().unwrap().clone();
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                match self.results.lock().unwrap().get(name) {
                    Some(result) => JsonRpcResponse::success(id, serde_json::to_value(result).unwrap()),
                    None => JsonRpcResponse::success(id, json!({ "content": [] })),
                }
            }
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Ok(response)
    }
}
