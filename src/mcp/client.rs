//! MCP client session on top of a [`McpTransport`].
//!
//! A session is short-lived: open, `initialize`, discover tools, call one,
//! `close`. The JSON-RPC plumbing (serializing params, unwrapping `result`
//! vs. `error`) lives here as well since only this client uses it.
//!
//! # Example
//! ```rust,ignore
//! let transport = connector.connect(&endpoint).await?;
//! let mut client = McpClient::new(transport);
//! client.initialize().await?;
//! let tools = client.list_tools().await?;
//! let result = client.call_tool("search_works", arguments).await?;
//! client.close().await?;
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use super::transport::{McpTransport, TransportError};
use super::types::{
    CallToolRequest, CallToolResult, Implementation, InitializeRequest, InitializeResponse,
    ListToolsRequest, ListToolsResult, Tool, PROTOCOL_VERSION,
};

/// Upper bound on `tools/list` pages followed for one discovery.
const MAX_TOOL_PAGES: usize = 32;

/// Errors that can occur during MCP client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Client is not initialized.
    #[error("Client not initialized")]
    NotInitialized,

    /// The server answered with a JSON-RPC error.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid response from server.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Create an invalid response error.
    pub fn invalid_response<E: fmt::Display>(err: E) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}

/// An MCP session bound to one transport.
pub struct McpClient {
    transport: Box<dyn McpTransport>,
    initialized: bool,
    protocol_version: Option<String>,
    server_info: Option<Implementation>,
}

impl fmt::Debug for McpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpClient")
            .field("initialized", &self.initialized)
            .field("protocol_version", &self.protocol_version)
            .field("server_info", &self.server_info)
            .finish()
    }
}

impl McpClient {
    /// Create a new, uninitialized client.
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport,
            initialized: false,
            protocol_version: None,
            server_info: None,
        }
    }

    /// Perform the MCP handshake.
    ///
    /// Sends `initialize` with no client capabilities, then the
    /// `notifications/initialized` notification.
    pub async fn initialize(&mut self) -> Result<(), ClientError> {
        if self.initialized {
            return Ok(());
        }

        let client_info = Implementation::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let request = InitializeRequest::new(PROTOCOL_VERSION, client_info);
        let response: InitializeResponse = self.call("initialize", request).await?;

        self.transport
            .notify("notifications/initialized", Value::Object(Map::new()))
            .await?;

        self.protocol_version = Some(response.protocol_version);
        self.server_info = response.server_info;
        self.initialized = true;
        Ok(())
    }

    /// Protocol version reported by the server.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Server implementation information.
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, ClientError> {
        self.ensure_initialized()?;

        let mut tools = Vec::new();
        let mut cursor = None;
        for _ in 0..MAX_TOOL_PAGES {
            let page: ListToolsResult = self.call("tools/list", ListToolsRequest { cursor }).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        Err(ClientError::InvalidResponse(format!(
            "tools/list did not terminate after {} pages",
            MAX_TOOL_PAGES
        )))
    }

    /// Call a tool by its exact remote name.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, ClientError> {
        self.ensure_initialized()?;

        let request = CallToolRequest {
            name: name.to_string(),
            arguments,
        };
        self.call("tools/call", request).await
    }

    /// Release the underlying transport.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.initialized = false;
        self.transport.close().await?;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), ClientError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ClientError::NotInitialized)
        }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(TransportError::serialization)?;
        let response = self.transport.request(method, params).await?;

        if let Some(error) = response.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| ClientError::invalid_response(format!("'{}' returned no result", method)))?;
        trace!("{} result: {}", method, result);

        serde_json::from_value(result)
            .map_err(|e| ClientError::invalid_response(format!("'{}': {}", method, e)))
    }
}
