//! The research agent: a fixed tool catalogue and the loop that lets a
//! reasoning engine use it.

pub mod catalog;
pub mod orchestrator;

use thiserror::Error;

pub use catalog::{menu, route, Operation, RemoteCall, RouteError, Service, DEFAULT_HOST};
pub use orchestrator::{
    AbortReason, Orchestrator, RunOutcome, DEFAULT_MAX_ITERATIONS, NOT_COMPLETED,
};

#[derive(Error, Debug)]
pub enum AgentError {
    /// The engine refused the API credential. Fatal for the run.
    #[error("credential rejected: {0}")]
    CredentialRejected(String),
}
