//! Anthropic Messages API transport

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::adapter::{ChatTransport, TransportRequest, TransportResponse};
use super::error::ProviderError;
use super::http::{build_client, malformed, post_json};
use super::types::Usage;

const API_VERSION: &str = "2023-06-01";

/// The Messages API requires an explicit output cap
const DEFAULT_MAX_TOKENS: u32 = 4096;

const JSON_INSTRUCTION: &str = "Respond with a single valid JSON object and nothing else.";

pub struct AnthropicTransport {
    client: Client,
    base_url: String,
}

impl AnthropicTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn build_body(request: &TransportRequest<'_>) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
        .collect();

    let mut system = request.system.to_string();
    if request.options.json_mode() {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(JSON_INSTRUCTION);
    }

    let mut body = json!({
        "model": request.model,
        "max_tokens": request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if let Some(temperature) = request.options.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

fn parse_response(provider: &str, body: &Value) -> Result<TransportResponse, ProviderError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| malformed(provider, "missing 'content' array"))?;

    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["output_tokens"].as_u64().unwrap_or(0) as u32,
    });

    Ok(TransportResponse {
        text,
        usage,
        truncated: body["stop_reason"] == "max_tokens",
    })
}

#[async_trait]
impl ChatTransport for AnthropicTransport {
    async fn send(
        &self,
        provider: &str,
        request: &TransportRequest<'_>,
    ) -> Result<TransportResponse, ProviderError> {
        let builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", request.api_key)
            .header("anthropic-version", API_VERSION);
        let body: Value = post_json(provider, builder, &build_body(request)).await?;
        parse_response(provider, &body)
    }
}
