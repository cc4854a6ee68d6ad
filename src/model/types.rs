//! Conversation and tool-use types shared by reasoning engines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition offered to the engine.
/// Same shape as an MCP tool definition: name, description, JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One block of assistant (or tool-result) content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
    /// Block kinds this client does not interpret (e.g. thinking).
    #[serde(other)]
    Unknown,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Result of one tool call, correlated to its request by `tool_use_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultEntry {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

impl From<ToolResultEntry> for ContentBlock {
    fn from(entry: ToolResultEntry) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: entry.tool_use_id,
            content: entry.content,
            is_error: entry.is_error,
        }
    }
}

/// One turn of the in-memory transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Assistant(Vec<ContentBlock>),
    /// All results of one dispatch round, in request order.
    ToolResults(Vec<ToolResultEntry>),
}

/// Why the engine stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopSignal {
    /// Final answer.
    EndTurn,
    /// The reply contains tool requests.
    ToolUse,
    /// Anything else (max_tokens, stop_sequence, refusal, ...).
    Other(String),
}

impl StopSignal {
    pub fn from_reason(reason: Option<&str>) -> Self {
        match reason {
            Some("end_turn") => StopSignal::EndTurn,
            Some("tool_use") => StopSignal::ToolUse,
            Some(other) => StopSignal::Other(other.to_string()),
            None => StopSignal::Other("none".to_string()),
        }
    }
}

/// A requested tool call extracted from a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineReply {
    pub signal: StopSignal,
    pub content: Vec<ContentBlock>,
}

impl EngineReply {
    /// Concatenation of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool requests in reply order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("auth error: {0}")]
    Auth(String),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_content_block_wire_shape() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            { "type": "text", "text": "Searching arXiv." },
            { "type": "tool_use", "id": "toolu_1", "name": "arxiv_search_by_title", "input": { "key": "Attention" } },
            { "type": "thinking", "thinking": "..." }
        ]))
        .unwrap();

        assert_eq!(blocks[2], ContentBlock::Unknown);

        let result: ContentBlock = ToolResultEntry {
            tool_use_id: "toolu_1".to_string(),
            content: "{}".to_string(),
            is_error: false,
        }
        .into();
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({ "type": "tool_result", "tool_use_id": "toolu_1", "content": "{}" })
        );
    }

    #[test]
    fn test_reply_text_and_calls() {
        let reply = EngineReply {
            signal: StopSignal::ToolUse,
            content: vec![
                ContentBlock::Text { text: "Part one. ".to_string() },
                ContentBlock::ToolUse {
                    id: "a".to_string(),
                    name: "crossref_search".to_string(),
                    input: json!({ "query": "LLM" }),
                },
                ContentBlock::Text { text: "Part two.".to_string() },
            ],
        };

        assert_eq!(reply.text(), "Part one. Part two.");
        let calls = reply.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "crossref_search");
    }

    #[test]
    fn test_stop_signal_from_reason() {
        assert_eq!(StopSignal::from_reason(Some("end_turn")), StopSignal::EndTurn);
        assert_eq!(StopSignal::from_reason(Some("tool_use")), StopSignal::ToolUse);
        assert_eq!(
            StopSignal::from_reason(Some("max_tokens")),
            StopSignal::Other("max_tokens".to_string())
        );
    }
}
