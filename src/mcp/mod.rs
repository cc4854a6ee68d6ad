//! MCP (Model Context Protocol) client for remote tool services.
//!
//! - [`types`]: JSON-RPC envelope and the MCP messages used here.
//! - [`transport`]: HTTP + SSE transport and the [`Connector`] seam.
//! - [`client`]: handshake, discovery and tool calls on one session.
//! - [`remote`]: [`RemoteToolClient`], the one-call-per-connection wrapper.

pub mod client;
pub mod remote;
pub mod transport;
pub mod types;

pub use client::{ClientError, McpClient};
pub use remote::{
    EndpointError, InvocationResult, InvokeError, RemoteToolClient, ResultItem, ServiceEndpoint,
    Stage,
};
pub use transport::{Connector, McpTransport, SseConnector, TransportConfig, TransportError};
