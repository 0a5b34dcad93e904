//! Generic JSON-over-HTTP tool.
//!
//! Used for the external services agents call besides the LLM itself:
//! web search, render/image generation endpoints, browser automation
//! gateways. The tool POSTs its input as JSON and returns the JSON body.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub struct HttpTool {
    name: String,
    description: String,
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            description: description.into(),
            endpoint: endpoint.into(),
            api_key: None,
            http,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let mut request = self.http.post(&self.endpoint).json(&input);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimited(format!(
                "{} rejected the request with 429",
                self.name
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
