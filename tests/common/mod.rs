//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod mock_mcp_server;
pub mod mock_transport;

pub use mock_mcp_server::{FailAt, MockMcpServer};
pub use mock_transport::{MockConnector, MockTransport};
