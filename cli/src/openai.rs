use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use brewlog_core::error::BrewError;
use brewlog_core::models::Suggestion;
use brewlog_core::remote::{
    ChatRequest, ChatResponse, SuggestionProvider, SuggestionRequest, parse_chat_response,
};

use crate::config::OpenAiConfig;

/// Suggestion provider backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "brewlog-cli/{} (coffee brewing companion)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(20))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

impl SuggestionProvider for OpenAiClient {
    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn fetch_suggestion(&self, request: &SuggestionRequest<'_>) -> Result<Suggestion> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| BrewError::RemoteSuggestion("no API key configured".into()))?;
        let body = ChatRequest::for_suggestion(&self.config.model, request);
        debug!(
            url = %self.config.url,
            model = %self.config.model,
            method = %request.method,
            history = request.history.len(),
            "requesting remote suggestion"
        );

        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach the suggestion service")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BrewError::RemoteSuggestion(format!(
                "suggestion service returned HTTP {status}"
            ))
            .into());
        }

        let data: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse suggestion service response")?;
        parse_chat_response(data, request.method)
    }
}
