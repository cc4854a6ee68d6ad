//! Mock transport and connector wired to [`MockMcpServer`]s.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use scholar_agent::mcp::transport::{Connector, McpTransport, TransportError};
use scholar_agent::mcp::types::JsonRpcResponse;
use scholar_agent::mcp::ServiceEndpoint;

use super::mock_mcp_server::{FailAt, MockMcpServer};

/// A mock transport that forwards to a MockMcpServer.
pub struct MockTransport {
    server: Arc<MockMcpServer>,
}

#[async_trait]
impl McpTransport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse, TransportError> {
        self.server.handle(method, params)
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        self.server.handle(method, params).map(|_| ())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.server.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Routes each endpoint, by service name, to its mock server. Unknown
/// names are refused like an unreachable host.
#[derive(Default)]
pub struct MockConnector {
    servers: Mutex<HashMap<String, Arc<MockMcpServer>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, service_name: &str, server: MockMcpServer) -> Self {
        self.servers
            .lock()
            .unwrap()
            .insert(service_name.to_string(), Arc::new(server));
        self
    }

    pub fn server(&self, service_name: &str) -> Arc<MockMcpServer> {
        self.servers.lock().unwrap()[service_name].clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> Result<Box<dyn McpTransport>, TransportError> {
        let server = self
            .servers
            .lock()
            .unwrap()
            .get(endpoint.name())
            .cloned()
            .ok_or_else(|| TransportError::Connection("Connection refused".to_string()))?;

        if server.fails_at(FailAt::Connect) {
            return Err(TransportError::Connection("Connection refused".to_string()));
        }
        server.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransport { server }))
    }
}
