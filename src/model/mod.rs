//! Reasoning engine boundary.
//!
//! ## Structure
//!
//! - `types`: transcript turns, content blocks, replies, errors
//! - `traits`: the [`ReasoningEngine`] trait
//! - `providers/`: provider-specific implementations

pub mod types;
pub mod traits;

pub mod providers;

pub use types::{
    ContentBlock, EngineReply, ModelError, StopSignal, ToolCall, ToolDescriptor, ToolResultEntry,
    Turn,
};
pub use traits::ReasoningEngine;

pub use providers::anthropic::AnthropicClient;
