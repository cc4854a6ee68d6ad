//! Academic search agent over remote MCP services.
//!
//! # Architecture
//!
//! - `mcp`: MCP client over HTTP + SSE and the one-shot [`RemoteToolClient`](mcp::RemoteToolClient)
//! - `model`: reasoning engine trait and the Anthropic Messages client
//! - `agent`: service/operation catalogue and the orchestration loop
//! - `config`: API credential and environment settings
//! - `probe`: connectivity check for every service
//! - `papers` / `report`: paper extraction and Markdown reports

pub mod agent;
pub mod config;
pub mod mcp;
pub mod model;
pub mod papers;
pub mod probe;
pub mod report;

pub use agent::{AgentError, Orchestrator, RunOutcome};
pub use mcp::{InvocationResult, InvokeError, RemoteToolClient, ServiceEndpoint};

/// Install the global `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` overrides the default filter. Logs go to stderr so stdout
/// stays free for reports and summaries.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scholar_agent=info,warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
