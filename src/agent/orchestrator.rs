//! Orchestration loop: lets a reasoning engine drive remote tool calls.
//!
//! The loop is an explicit state machine. Every entry into
//! `AwaitingEngineResponse` consumes one unit of the iteration budget, so a
//! run ends after at most `max_iterations` engine calls whatever the engine
//! replies. Tool calls of one turn are dispatched one after another; a
//! failed call becomes an error payload and never stops its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::catalog::{self, Service};
use super::AgentError;
use crate::mcp::{Connector, EndpointError, InvocationResult, InvokeError, RemoteToolClient};
use crate::model::{
    EngineReply, ModelError, ReasoningEngine, StopSignal, ToolCall, ToolDescriptor,
    ToolResultEntry, Turn,
};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

pub const NOT_COMPLETED: &str = "Task not completed (iteration budget exhausted)";

/// Why a run stopped without an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The engine stopped for a reason other than a final answer or tool use.
    UnexpectedStop(String),
    BudgetExhausted,
    /// Non-credential engine failure (network, server error, bad payload).
    EngineFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { answer: String, iterations: usize },
    Aborted { reason: AbortReason, iterations: usize },
}

impl RunOutcome {
    pub fn iterations(&self) -> usize {
        match self {
            RunOutcome::Completed { iterations, .. } | RunOutcome::Aborted { iterations, .. } => {
                *iterations
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    /// Text to present or save: the answer, or an explicit "not completed".
    pub fn report_text(&self) -> String {
        match self {
            RunOutcome::Completed { answer, .. } => answer.clone(),
            RunOutcome::Aborted { reason: AbortReason::BudgetExhausted, .. } => NOT_COMPLETED.to_string(),
            RunOutcome::Aborted { reason: AbortReason::UnexpectedStop(stop), .. } => {
                format!("Task not completed (unexpected stop: {stop})")
            }
            RunOutcome::Aborted { reason: AbortReason::EngineFailure(message), .. } => {
                format!("Task not completed (engine error: {message})")
            }
        }
    }
}

enum LoopState {
    AwaitingEngineResponse,
    DispatchingTools(EngineReply),
    Done(String),
    Aborted(AbortReason),
}

pub struct Orchestrator<E> {
    engine: E,
    clients: HashMap<Service, RemoteToolClient>,
    menu: Vec<ToolDescriptor>,
    max_iterations: usize,
}

impl<E: ReasoningEngine> Orchestrator<E> {
    /// One client per catalogue service, all reached through `connector`.
    pub fn new(engine: E, connector: Arc<dyn Connector>, host: &str) -> Result<Self, EndpointError> {
        let mut clients = HashMap::new();
        for service in Service::ALL {
            clients.insert(
                service,
                RemoteToolClient::new(service.endpoint(host)?, connector.clone()),
            );
        }
        Ok(Self::with_clients(engine, clients))
    }

    pub fn with_clients(engine: E, clients: HashMap<Service, RemoteToolClient>) -> Self {
        Self {
            engine,
            clients,
            menu: catalog::menu(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Drive the engine until it answers, stops unexpectedly or runs out of
    /// budget. Only a rejected credential is returned as an error.
    pub async fn run(&self, instruction: &str) -> Result<RunOutcome, AgentError> {
        let mut history = vec![Turn::User(instruction.to_string())];
        let mut iterations = 0;
        let mut state = LoopState::AwaitingEngineResponse;

        info!(
            "Starting run with model {} (budget {})",
            self.engine.model_id(),
            self.max_iterations
        );

        loop {
            state = match state {
                LoopState::AwaitingEngineResponse => {
                    if iterations >= self.max_iterations {
                        LoopState::Aborted(AbortReason::BudgetExhausted)
                    } else {
                        iterations += 1;
                        info!("Iteration {}/{}", iterations, self.max_iterations);
                        self.await_engine(&history).await?
                    }
                }
                LoopState::DispatchingTools(reply) => {
                    let calls = reply.tool_calls();
                    if calls.is_empty() {
                        LoopState::Aborted(AbortReason::UnexpectedStop(
                            "tool_use without tool requests".to_string(),
                        ))
                    } else {
                        let mut results = Vec::with_capacity(calls.len());
                        for call in &calls {
                            results.push(self.dispatch(call).await);
                        }
                        history.push(Turn::Assistant(reply.content));
                        history.push(Turn::ToolResults(results));
                        LoopState::AwaitingEngineResponse
                    }
                }
                LoopState::Done(answer) => {
                    info!("Run completed after {} iteration(s)", iterations);
                    return Ok(RunOutcome::Completed { answer, iterations });
                }
                LoopState::Aborted(reason) => {
                    warn!("Run aborted after {} iteration(s): {:?}", iterations, reason);
                    return Ok(RunOutcome::Aborted { reason, iterations });
                }
            };
        }
    }

    async fn await_engine(&self, history: &[Turn]) -> Result<LoopState, AgentError> {
        let reply = match self.engine.respond(history, &self.menu).await {
            Ok(reply) => reply,
            Err(ModelError::Auth(message)) => return Err(AgentError::CredentialRejected(message)),
            Err(e) => return Ok(LoopState::Aborted(AbortReason::EngineFailure(e.to_string()))),
        };

        debug!("Engine stop signal: {:?}", reply.signal);
        Ok(match &reply.signal {
            StopSignal::EndTurn => LoopState::Done(reply.text()),
            StopSignal::ToolUse => LoopState::DispatchingTools(reply),
            StopSignal::Other(reason) => LoopState::Aborted(AbortReason::UnexpectedStop(reason.clone())),
        })
    }

    /// Execute one tool request. Never fails: problems become an error
    /// payload flagged `is_error`.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResultEntry {
        info!("Tool request {}: {} {}", call.id, call.name, call.input);

        let (payload, is_error) = match self.execute(call).await {
            Ok(value) => (value, false),
            Err(value) => {
                warn!("Tool {} failed: {}", call.name, value);
                (value, true)
            }
        };

        ToolResultEntry {
            tool_use_id: call.id.clone(),
            content: serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
            is_error,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, Value> {
        let remote = catalog::route(&call.name, &call.input).map_err(|e| error_payload(e.to_string()))?;

        let client = self.clients.get(&remote.service).ok_or_else(|| {
            error_payload(format!("service {} is not configured", remote.service.display_name()))
        })?;

        match client.invoke(remote.capability, remote.arguments).await {
            Ok(InvocationResult::Empty) => Err(error_payload("no data returned")),
            Ok(result) => Ok(result.to_json()),
            Err(err) => {
                let mut payload = error_payload(err.to_string());
                if let InvokeError::CapabilityNotFound { available, .. } = &err {
                    payload["available_tools"] = json!(available);
                }
                Err(payload)
            }
        }
    }
}

fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_text() {
        let done = RunOutcome::Completed {
            answer: "# Survey".to_string(),
            iterations: 3,
        };
        assert_eq!(done.report_text(), "# Survey");
        assert!(done.is_completed());

        let exhausted = RunOutcome::Aborted {
            reason: AbortReason::BudgetExhausted,
            iterations: 10,
        };
        assert_eq!(exhausted.report_text(), NOT_COMPLETED);
        assert_eq!(exhausted.iterations(), 10);

        let stopped = RunOutcome::Aborted {
            reason: AbortReason::UnexpectedStop("max_tokens".to_string()),
            iterations: 2,
        };
        assert_eq!(stopped.report_text(), "Task not completed (unexpected stop: max_tokens)");
    }
}
