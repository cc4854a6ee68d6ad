//! Remote Tool Client: one capability invocation against one remote service.
//!
//! Every call opens a fresh connection, performs the handshake, discovers
//! the capability set, checks the requested name against it, invokes it and
//! normalizes the returned content. Discovery results are never cached, so
//! the existence check always uses the capability set seen on the same
//! connection.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::McpClient;
use super::transport::Connector;
use super::types::Content;

// ============================================================================
// Endpoint
// ============================================================================

/// Network address and display name of one remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    name: String,
    url: String,
}

/// Rejected endpoint definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("service name must not be empty")]
    EmptyName,
    #[error("invalid service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ServiceEndpoint {
    /// Create an endpoint. The url must be absolute http(s).
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, EndpointError> {
        let name = name.into();
        let url = url.into();

        if name.trim().is_empty() {
            return Err(EndpointError::EmptyName);
        }
        let parsed = Url::parse(&url).map_err(|e| EndpointError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EndpointError::InvalidUrl {
                url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self { name, url })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

// ============================================================================
// Results
// ============================================================================

/// One content item returned by a capability.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    /// Text that decoded as JSON.
    Structured(Value),
    /// Text that did not decode as JSON, kept unchanged.
    Raw(String),
}

impl ResultItem {
    /// Decode a text item, falling back to the raw string.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => ResultItem::Structured(value),
            Err(_) => ResultItem::Raw(text.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResultItem::Structured(value) => value.clone(),
            ResultItem::Raw(text) => Value::String(text.clone()),
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            ResultItem::Structured(value) => Some(value),
            ResultItem::Raw(_) => None,
        }
    }
}

/// Normalized outcome of a successful invocation.
///
/// Items are never merged: zero items is `Empty`, exactly one is `Single`,
/// more keep their response order in `Sequence`.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Empty,
    Single(ResultItem),
    Sequence(Vec<ResultItem>),
}

impl InvocationResult {
    /// Normalize tool content. Only `text` items are interpreted.
    pub fn from_content(content: &[Content]) -> Self {
        let mut items: Vec<ResultItem> = content
            .iter()
            .filter_map(|item| match item.as_text() {
                Some(text) => Some(ResultItem::from_text(text)),
                None => {
                    debug!("Skipping {} content item", item.kind());
                    None
                }
            })
            .collect();

        match items.len() {
            0 => InvocationResult::Empty,
            1 => InvocationResult::Single(items.remove(0)),
            _ => InvocationResult::Sequence(items),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, InvocationResult::Empty)
    }

    /// All items in response order.
    pub fn items(&self) -> Vec<&ResultItem> {
        match self {
            InvocationResult::Empty => Vec::new(),
            InvocationResult::Single(item) => vec![item],
            InvocationResult::Sequence(items) => items.iter().collect(),
        }
    }

    /// JSON view: `null`, the single item, or an array.
    pub fn to_json(&self) -> Value {
        match self {
            InvocationResult::Empty => Value::Null,
            InvocationResult::Single(item) => item.to_json(),
            InvocationResult::Sequence(items) => {
                Value::Array(items.iter().map(ResultItem::to_json).collect())
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Where in the connection lifetime a remote failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Handshake,
    Discovery,
    Invocation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connect => write!(f, "connect"),
            Stage::Handshake => write!(f, "handshake"),
            Stage::Discovery => write!(f, "discovery"),
            Stage::Invocation => write!(f, "invocation"),
        }
    }
}

/// Failure of one `invoke` call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// The requested capability is not in the discovered set.
    #[error("[{service}] tool '{requested}' not found, available: {available:?}")]
    CapabilityNotFound {
        service: String,
        requested: String,
        available: Vec<String>,
    },

    /// Transport or session failure.
    #[error("[{service}] {stage} failed: {cause}")]
    RemoteFailure {
        service: String,
        stage: Stage,
        cause: String,
    },
}

impl InvokeError {
    pub fn service(&self) -> &str {
        match self {
            InvokeError::CapabilityNotFound { service, .. } => service,
            InvokeError::RemoteFailure { service, .. } => service,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Invokes capabilities on one remote service.
#[derive(Clone)]
pub struct RemoteToolClient {
    endpoint: ServiceEndpoint,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for RemoteToolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteToolClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl RemoteToolClient {
    pub fn new(endpoint: ServiceEndpoint, connector: Arc<dyn Connector>) -> Self {
        Self {
            endpoint,
            connector,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Invoke `capability` with `arguments` forwarded verbatim.
    ///
    /// The connection is closed before returning, whatever the outcome.
    /// Argument validation is left to the remote service.
    pub async fn invoke(
        &self,
        capability: &str,
        arguments: Map<String, Value>,
    ) -> Result<InvocationResult, InvokeError> {
        info!("[{}] Connecting to {}", self.endpoint.name, self.endpoint.url);

        let transport = self
            .connector
            .connect(&self.endpoint)
            .await
            .map_err(|e| self.failure(Stage::Connect, e))?;

        let mut client = McpClient::new(transport);
        let outcome = self.run_session(&mut client, capability, arguments).await;

        if let Err(e) = client.close().await {
            warn!("[{}] Failed to close connection: {}", self.endpoint.name, e);
        }

        match &outcome {
            Ok(result) => info!(
                "[{}] {} returned {} item(s)",
                self.endpoint.name,
                capability,
                result.items().len()
            ),
            Err(e) => warn!("{}", e),
        }
        outcome
    }

    async fn run_session(
        &self,
        client: &mut McpClient,
        capability: &str,
        arguments: Map<String, Value>,
    ) -> Result<InvocationResult, InvokeError> {
        client
            .initialize()
            .await
            .map_err(|e| self.failure(Stage::Handshake, e))?;
        debug!(
            "[{}] Session open: protocol={}, server={}",
            self.endpoint.name,
            client.protocol_version().unwrap_or("unknown"),
            client
                .server_info()
                .map(|info| format!("{} {}", info.name, info.version))
                .unwrap_or_else(|| "unknown".to_string())
        );

        let tools = client
            .list_tools()
            .await
            .map_err(|e| self.failure(Stage::Discovery, e))?;
        let available: Vec<String> = tools.into_iter().map(|tool| tool.name).collect();
        debug!("[{}] Available tools: {:?}", self.endpoint.name, available);

        if !available.iter().any(|name| name == capability) {
            return Err(InvokeError::CapabilityNotFound {
                service: self.endpoint.name.clone(),
                requested: capability.to_string(),
                available,
            });
        }

        info!("[{}] Calling {}", self.endpoint.name, capability);
        let result = client
            .call_tool(capability, arguments)
            .await
            .map_err(|e| self.failure(Stage::Invocation, e))?;

        if result.is_error == Some(true) {
            warn!(
                "[{}] {} reported a tool error; returning its content",
                self.endpoint.name, capability
            );
        }

        Ok(InvocationResult::from_content(&result.content))
    }

    fn failure(&self, stage: Stage, cause: impl fmt::Display) -> InvokeError {
        InvokeError::RemoteFailure {
            service: self.endpoint.name.clone(),
            stage,
            cause: cause.to_string(),
        }
    }
}
