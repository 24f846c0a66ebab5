use async_trait::async_trait;
use picks_core::{LanguageModel, LlmError, StructuredRequest};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::extract::extract_json_from_text;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// OpenAI chat-completions client using `json_schema` response formatting
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self { client, config })
    }

    async fn call_once(&self, request: &StructuredRequest) -> Result<Value, LlmError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                }
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Parse error: {}", e)))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".into()))?;

        if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
            return Err(LlmError::InvalidResponse(format!("model refused: {}", refusal)));
        }

        let content = message
            .content
            .ok_or_else(|| LlmError::InvalidResponse("empty message content".into()))?;
        parse_content(&content)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn generate_object(&self, request: &StructuredRequest) -> Result<Value, LlmError> {
        debug!(
            "Generating {} with model '{}' (prompt length: {} chars)",
            request.schema_name,
            request.model,
            request.prompt.len()
        );

        let mut attempt = 0u32;
        loop {
            match self.call_once(request).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < request.max_retries => {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    warn!(
                        "{} call failed ({}), retrying in {}s ({}/{})",
                        request.schema_name,
                        e,
                        backoff.as_secs(),
                        attempt + 1,
                        request.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn map_status(status: StatusCode, body: &str) -> LlmError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body);
    match status.as_u16() {
        401 | 403 => LlmError::Unauthorized(detail),
        408 => LlmError::Timeout(0),
        429 => LlmError::RateLimited(detail),
        500..=599 => LlmError::Unavailable(detail),
        _ => LlmError::InvalidResponse(detail),
    }
}

fn parse_content(content: &str) -> Result<Value, LlmError> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Ok(value);
    }
    let extracted = extract_json_from_text(content)
        .ok_or_else(|| LlmError::InvalidResponse("No valid JSON found in response".into()))?;
    serde_json::from_str(&extracted)
        .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
}
