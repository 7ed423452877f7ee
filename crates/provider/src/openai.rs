//! OpenAI-compatible HTTP node.
//!
//! Works against OpenRouter or any chat-completions endpoint. The request
//! builder is the second enforcement point for invocation identifiers: a
//! tool message whose `tool_call_id` fails validation is serialized without
//! the field, because the endpoint rejects malformed values outright while
//! tolerating omission.

use crate::call_id::validate_call_id;
use crate::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let is_openrouter = api_key.starts_with("sk-or-")
            || api_base
                .as_ref()
                .map(|b| b.contains("openrouter"))
                .unwrap_or(false);

        let api_base = api_base.unwrap_or_else(|| {
            if is_openrouter {
                "https://openrouter.ai/api/v1".to_string()
            } else {
                "https://api.openai.com/v1".to_string()
            }
        });

        let default_model = default_model.unwrap_or_else(|| {
            if is_openrouter {
                "anthropic/claude-sonnet-4".to_string()
            } else {
                "gpt-4".to_string()
            }
        });

        Self {
            client: Client::new(),
            api_key,
            api_base,
            default_model,
        }
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                // Arguments arrive as a JSON-encoded string on the wire
                let args = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments: args,
                });
            }
        }

        let usage = if let Some(usage) = json["usage"].as_object() {
            Usage {
                prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

/// Build the wire body for a chat-completions call.
///
/// Invocation identifiers on tool messages are validated here; a
/// non-conforming identifier is dropped rather than serialized.
pub fn request_body(params: &ChatParams) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = params
        .messages
        .iter()
        .map(|m| {
            let mut obj = json!({ "role": &m.role });
            if let Some(content) = &m.content {
                obj["content"] = json!(content);
            }
            if let Some(tool_calls) = &m.tool_calls {
                obj["tool_calls"] = json!(tool_calls);
            }
            if let Some(tool_call_id) = &m.tool_call_id {
                if let Some(valid) = validate_call_id(tool_call_id) {
                    obj["tool_call_id"] = json!(valid);
                }
            }
            if let Some(name) = &m.name {
                obj["name"] = json!(name);
            }
            obj
        })
        .collect();

    let mut body = json!({
        "model": params.model,
        "messages": messages,
        "max_tokens": params.max_tokens,
        "temperature": params.temperature,
    });

    if !params.tools.is_empty() {
        let tools: Vec<serde_json::Value> = params
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": &t.function.name,
                        "description": &t.function.description,
                        "parameters": &t.function.parameters
                    }
                })
            })
            .collect();

        body["tools"] = json!(tools);
        body["tool_choice"] = match &params.tool_choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::Required(name) => {
                json!({"type": "function", "function": {"name": name}})
            }
            ToolChoice::None => json!("none"),
        };
    }

    body
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let body = request_body(&params);
        trace!("request body: {}", body);

        let url = format!("{}/chat/completions", self.api_base);
        debug!("chat call to {} ({})", url, params.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{}: {}", status, text)));
        }

        let json: serde_json::Value = response.json().await?;
        self.parse_response(json)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
