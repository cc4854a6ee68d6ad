//! Traits for reasoning engines.

use crate::model::types::{EngineReply, ModelError, ToolDescriptor, Turn};

/// A tool-calling chat model.
/// Implemented by provider-specific clients ([`AnthropicClient`](crate::model::AnthropicClient)).
#[allow(async_fn_in_trait)]
pub trait ReasoningEngine: Send + Sync {
    fn model_id(&self) -> String;

    /// Continue the conversation given the full history and the tool menu.
    async fn respond(&self, history: &[Turn], tools: &[ToolDescriptor]) -> Result<EngineReply, ModelError>;
}
