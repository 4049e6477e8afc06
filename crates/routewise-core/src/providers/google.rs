//! Google Gemini generateContent transport

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};

use super::adapter::{ChatTransport, TransportRequest, TransportResponse};
use super::error::ProviderError;
use super::http::{build_client, malformed, post_json};
use super::types::{Role, Usage};

pub struct GoogleTransport {
    client: Client,
    base_url: String,
}

impl GoogleTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn build_body(request: &TransportRequest<'_>) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut config = Map::new();
    if let Some(temperature) = request.options.temperature {
        config.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.options.max_tokens {
        config.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if request.options.json_mode() {
        config.insert("responseMimeType".to_string(), json!("application/json"));
    }

    let mut body = json!({ "contents": contents });
    if !request.system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
    }
    if !config.is_empty() {
        body["generationConfig"] = Value::Object(config);
    }
    body
}

fn parse_response(provider: &str, body: &Value) -> Result<TransportResponse, ProviderError> {
    let candidate = body["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| malformed(provider, "missing 'candidates'"))?;

    let parts = candidate["content"]["parts"]
        .as_array()
        .ok_or_else(|| malformed(provider, "candidate has no content parts"))?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();

    let usage = body.get("usageMetadata").map(|u| Usage {
        input_tokens: u["promptTokenCount"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
    });

    Ok(TransportResponse {
        text,
        usage,
        truncated: candidate["finishReason"] == "MAX_TOKENS",
    })
}

#[async_trait]
impl ChatTransport for GoogleTransport {
    async fn send(
        &self,
        provider: &str,
        request: &TransportRequest<'_>,
    ) -> Result<TransportResponse, ProviderError> {
        let builder = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", request.api_key);
        let body: Value = post_json(provider, builder, &build_body(request)).await?;
        parse_response(provider, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::{GenerationOptions, Message};

    #[test]
    fn test_body_maps_roles_and_config() {
        let messages = [Message::user("a"), Message::assistant("b")];
        let options = GenerationOptions {
            temperature: Some(0.25),
            max_tokens: Some(128),
            json_mode: Some(true),
            ..Default::default()
        };
        let body = build_body(&TransportRequest {
            api_key: "k",
            model: "gemini-2.0-flash",
            messages: &messages,
            system: "sys",
            options: &options,
        });
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "b");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
        assert_eq!(body["generationConfig"]["temperature"], 0.25);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_body_omits_empty_sections() {
        let messages = [Message::user("a")];
        let options = GenerationOptions::default();
        let body = build_body(&TransportRequest {
            api_key: "k",
            model: "gemini-1.5-pro",
            messages: &messages,
            system: "",
            options: &options,
        });
        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_parse_candidate() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Paris"}, {"text": "."}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
        });
        let parsed = parse_response("google", &body).unwrap();
        assert_eq!(parsed.text, "Paris.");
        assert_eq!(parsed.usage, Some(Usage { input_tokens: 7, output_tokens: 2 }));
        assert!(!parsed.truncated);
    }

    #[test]
    fn test_parse_max_tokens_and_blocked() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "long"}]}, "finishReason": "MAX_TOKENS"}]
        });
        assert!(parse_response("google", &body).unwrap().truncated);

        // Safety-blocked candidates come back without content
        let blocked = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let err = parse_response("google", &blocked).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }
}
