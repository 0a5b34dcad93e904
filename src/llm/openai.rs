//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that speaks `POST {api_base}/chat/completions`
//! (OpenAI, OpenRouter, vLLM, LM Studio, ...).

use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default public OpenAI API base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion APIs
pub struct OpenAIClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAIClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    async fn chat(&self, messages: Vec<ChatMessage<'_>>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::RateLimited(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Http {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::LLM("Completion response contained no content".to_string()))
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(vec![ChatMessage {
            role: "user",
            content: prompt,
        }])
        .await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ])
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
