//! Chat provider abstraction and the OpenAI-compatible implementation.
//!
//! The orchestrator only ever talks to the [`ChatProvider`] trait: it sends
//! a system prompt, a message transcript, and tool definitions, and gets
//! back either answer text, tool calls, or both. That keeps the tool loop
//! testable with a scripted provider and keeps wire concerns out of it.
//!
//! The [`OpenAIChatProvider`] speaks the chat-completions protocol against
//! any OpenAI-compatible endpoint (`chat.base_url` in config). Tool call
//! arguments travel as JSON-encoded strings on the wire; they are parsed
//! into [`serde_json::Value`] before anything else sees them.
//!
//! Retry strategy matches the embedding client: 429 and 5xx retry with
//! exponential backoff, other 4xx fail immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ChatConfig;

/// One message in a chat transcript.
///
/// Only the fields relevant to the role are populated: `tool_calls` on
/// assistant messages that requested tools, `tool_call_id` on tool result
/// messages.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tool executions.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result text for one tool call, linked by the call id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call requested by the model, with arguments already parsed
/// from their wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One completion request: system prompt, transcript, and the tools the
/// model may call this round (empty to force a plain answer).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
}

/// The model's reply: answer text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

// ============ Disabled Provider ============

/// Fails every completion; used when `chat.provider = "disabled"`.
pub struct DisabledChatProvider;

#[async_trait]
impl ChatProvider for DisabledChatProvider {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse> {
        bail!("Chat provider is disabled. Set [chat] provider in config.")
    }
}

// ============ OpenAI-compatible Provider ============

/// Chat provider speaking the OpenAI chat-completions protocol.
///
/// Works against the real OpenAI API or any compatible endpoint via
/// `chat.base_url`. The API key is read from the environment variable
/// named by `chat.api_key_env`.
pub struct OpenAIChatProvider {
    config: ChatConfig,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIChatProvider {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("chat.model required for OpenAI provider"))?;

        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut wire_messages = Vec::with_capacity(request.messages.len() + 1);
        wire_messages.push(json!({"role": "system", "content": request.system}));
        for message in &request.messages {
            wire_messages.push(message_to_wire(message));
        }

        let mut body = json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.clone());
            body["tool_choice"] = json!("auto");
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Chat API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Chat API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Chat completion failed after retries")))
    }
}

/// Encode one transcript message in chat-completions wire form.
///
/// Assistant tool calls carry their arguments re-serialized to a JSON
/// string, as the protocol requires.
fn message_to_wire(message: &ChatMessage) -> Value {
    if message.role == "tool" {
        return json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        });
    }

    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
        return json!({
            "role": message.role,
            "content": message.content,
            "tool_calls": calls,
        });
    }

    json!({
        "role": message.role,
        "content": message.content,
    })
}

/// Parse a chat-completions response body into a [`ChatResponse`].
///
/// Tool call arguments arrive as JSON-encoded strings; arguments that fail
/// to parse become an empty object so the tool layer can reject them with
/// a readable message instead of the whole round failing.
fn parse_chat_response(json: &Value) -> Result<ChatResponse> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message"))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let function = call
                .get("function")
                .ok_or_else(|| anyhow::anyhow!("Invalid tool call: missing function"))?;
            let name = function
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid tool call: missing name"))?
                .to_string();
            let arguments = function
                .get("arguments")
                .and_then(|v| v.as_str())
                .map(|s| serde_json::from_str(s).unwrap_or_else(|_| json!({})))
                .unwrap_or_else(|| json!({}));

            tool_calls.push(ToolCallRequest {
                id,
                name,
                arguments,
            });
        }
    }

    Ok(ChatResponse {
        content,
        tool_calls,
    })
}

/// Create the configured [`ChatProvider`].
pub fn create_chat_provider(config: &ChatConfig) -> Result<Box<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledChatProvider)),
        "openai" => Ok(Box::new(OpenAIChatProvider::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}
