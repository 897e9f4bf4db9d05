//! LLM API client for OpenAI-compatible providers and ERNIE

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::config::LlmProvider;
use crate::config::ResolvedLlmConfig;
use crate::errors::FusionRagError;
use crate::errors::Result;
use crate::llm::TextGenerator;

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Client for chat completion APIs
pub struct LlmClient {
    config: ResolvedLlmConfig,
    client: Client,
}

impl LlmClient {
    /// Create a new LLM client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(config: ResolvedLlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FusionRagError::HttpError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Resolve the `[llm]` section (provider defaults, credential env var) and build a client
    ///
    /// # Errors
    /// - Missing credential for the configured provider
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.llm.resolve()?)
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a chat request
    ///
    /// # Errors
    /// - Network errors (timeouts, connection failures)
    /// - Non-success status from the provider
    /// - Responses without generated content
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        if self.config.provider.is_openai_compatible() {
            self.chat_openai(messages, temperature, max_tokens).await
        } else {
            self.chat_ernie(messages, temperature, max_tokens).await
        }
    }

    async fn chat_openai(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(
            "Calling {} chat completions API: {} ({} messages)",
            self.config.provider,
            url,
            messages.len()
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FusionRagError::LlmError(format!(
                "{} API error ({status}): {error_text}",
                self.config.provider
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FusionRagError::LlmError(format!("Failed to parse response: {e}")))?;

        parse_openai_content(&body)
    }

    async fn chat_ernie(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct ErnieRequest<'a> {
            messages: &'a [ChatMessage],
            temperature: f32,
            max_output_tokens: u32,
        }

        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        debug!("Calling ERNIE API: {}", url);

        let (bearer, access_token) = split_ernie_key(&self.config.api_key);
        let mut builder = self
            .client
            .post(&url)
            .query(&[("access_token", access_token)])
            .header("Content-Type", "application/json");
        if let Some(bearer) = bearer {
            builder = builder.header("Authorization", format!("Bearer {bearer}"));
        }

        let response = builder
            .json(&ErnieRequest {
                messages,
                temperature,
                max_output_tokens: max_tokens,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FusionRagError::LlmError(format!(
                "ernie API error ({status}): {error_text}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FusionRagError::LlmError(format!("Failed to parse response: {e}")))?;

        parse_ernie_result(&body)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)], temperature, max_tokens)
            .await
    }
}

/// Extract `choices[0].message.content` from a chat completion body
fn parse_openai_content(body: &serde_json::Value) -> Result<String> {
    body.pointer("/choices/0/message/content")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FusionRagError::LlmError(format!("No content in response: {body}")))
}

/// ERNIE answers with `result` on success and `error_code`/`error_msg` otherwise
fn parse_ernie_result(body: &serde_json::Value) -> Result<String> {
    if let Some(result) = body.get("result").and_then(serde_json::Value::as_str) {
        return Ok(result.to_string());
    }
    Err(FusionRagError::LlmError(format!(
        "ernie API returned an error: {body}"
    )))
}

/// Split an ERNIE credential of the form `bearer:access_token`
fn split_ernie_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once(':') {
        Some((bearer, token)) if !token.contains(':') => (Some(bearer), token),
        _ => (None, key),
    }
}
