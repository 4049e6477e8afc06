//! OpenAI Chat Completions transport
//!
//! Also serves OpenAI-compatible endpoints (Groq, local gateways) through a
//! different base URL.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::adapter::{ChatTransport, TransportRequest, TransportResponse};
use super::error::ProviderError;
use super::http::{build_client, malformed, post_json};
use super::types::Usage;

pub struct OpenAiTransport {
    client: Client,
    base_url: String,
}

impl OpenAiTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn build_body(request: &TransportRequest<'_>) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        messages.push(json!({ "role": "system", "content": request.system }));
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content })),
    );

    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.options.temperature {
        body["temperature"] = json!(temperature);
    }
    if request.options.json_mode() {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

fn parse_response(provider: &str, body: &Value) -> Result<TransportResponse, ProviderError> {
    let choice = body["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| malformed(provider, "missing 'choices'"))?;

    let text = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| malformed(provider, "missing message content"))?
        .to_string();

    let usage = body.get("usage").filter(|u| u.is_object()).map(|u| Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });

    Ok(TransportResponse {
        text,
        usage,
        truncated: choice["finish_reason"] == "length",
    })
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn send(
        &self,
        provider: &str,
        request: &TransportRequest<'_>,
    ) -> Result<TransportResponse, ProviderError> {
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(request.api_key);
        let body: Value = post_json(provider, builder, &build_body(request)).await?;
        parse_response(provider, &body)
    }
}
