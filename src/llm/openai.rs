use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::model::AlignedRecord;
use super::prompt::PromptBuilder;
use super::provider::{LlmError, LlmJob, LlmProvider, Result};
use super::schema::{strip_code_fences, validate_aligned_json};

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, temperature: f32, max_tokens: u32, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a plain timeout");
        Self {
            client,
            api_key,
            model,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn align(&self, job: &LlmJob) -> Result<AlignedRecord> {
        let raw_text = String::from_utf8_lossy(&job.raw_bytes);
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": PromptBuilder::system_instruction() },
                { "role": "user", "content": PromptBuilder::user_message(&raw_text) },
            ],
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::QuotaExceeded);
        }
        if !response.status().is_success() {
            return Err(LlmError::Request(format!(
                "openai returned status {}",
                response.status()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Request("missing message content in openai response".into()))?;

        let parsed: Value = serde_json::from_str(strip_code_fences(content))
            .map_err(|e| LlmError::SchemaViolation(format!("invalid json: {e}")))?;
        validate_aligned_json(&parsed)?;

        serde_json::from_value(parsed).map_err(|e| LlmError::SchemaViolation(e.to_string()))
    }
}
