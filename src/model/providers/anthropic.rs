//! Anthropic Messages API client with native tool use.

use serde::{Deserialize, Serialize};

use crate::model::{
    ContentBlock, EngineReply, ModelError, ReasoningEngine, StopSignal, ToolDescriptor, Turn,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }
}

impl ReasoningEngine for AnthropicClient {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn respond(&self, history: &[Turn], tools: &[ToolDescriptor]) -> Result<EngineReply, ModelError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: history.iter().map(to_wire_message).collect(),
            tools: tools
                .iter()
                .map(|d| WireTool {
                    name: &d.name,
                    description: &d.description,
                    input_schema: &d.input_schema,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        tracing::debug!("Anthropic API response: status={}", status);

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ModelError::Auth(format!(
                "Anthropic auth failed ({status}). Check API key and account access."
            )));
        }
        if !status.is_success() {
            return Err(ModelError::Request(format!("Anthropic error {status}: {text}")));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::InvalidResponse(format!("Anthropic parse failed: {e}")))?;

        Ok(EngineReply {
            signal: StopSignal::from_reason(parsed.stop_reason.as_deref()),
            content: parsed.content,
        })
    }
}

fn to_wire_message(turn: &Turn) -> WireMessage {
    match turn {
        Turn::User(text) => WireMessage {
            role: "user",
            content: WireContent::Text(text.clone()),
        },
        Turn::Assistant(blocks) => WireMessage {
            role: "assistant",
            content: WireContent::Blocks(
                blocks
                    .iter()
                    .filter(|b| !matches!(b, ContentBlock::Unknown))
                    .cloned()
                    .collect(),
            ),
        },
        Turn::ToolResults(entries) => WireMessage {
            role: "user",
            content: WireContent::Blocks(entries.iter().cloned().map(ContentBlock::from).collect()),
        },
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}
