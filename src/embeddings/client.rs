//! Embedding API clients for various providers

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::config::EmbeddingsConfig;
use crate::embeddings::Embedder;
use crate::embeddings::MAX_BATCH_SIZE;
use crate::errors::FusionRagError;
use crate::errors::Result;

/// Maximum in-flight Ollama requests during batch embedding
const OLLAMA_CONCURRENCY: usize = 16;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// `OpenAI`-compatible embeddings API
    OpenAI,
    /// Ollama local embeddings
    Ollama,
}

/// Client for generating embeddings from various providers
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    dimension: usize,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    /// - Missing API key for the OpenAI provider
    pub fn new(config: &EmbeddingsConfig, timeout: Duration) -> Result<Self> {
        if config.provider == EmbeddingProvider::OpenAI && config.api_key.is_none() {
            return Err(FusionRagError::ConfigError(
                "OpenAI embeddings require embeddings.api_key".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FusionRagError::HttpError(e.to_string()))?;

        Ok(Self {
            provider: config.provider,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            dimension: config.dimension,
            client,
        })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.embeddings, config.call_timeout())
    }

    pub fn provider(&self) -> EmbeddingProvider {
        self.provider
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimension {
            Ok(())
        } else {
            Err(FusionRagError::EmbeddingError(format!(
                "Expected {} dimensions from {}, got {}",
                self.dimension,
                self.model,
                embedding.len()
            )))
        }
    }

    /// Generate embedding using `OpenAI` API
    async fn generate_openai(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| FusionRagError::ConfigError("OpenAI API key not provided".to_string()))?;

        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            input: &'a [&'a str],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI embeddings API: {} ({} items)", url, texts.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&OpenAIRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FusionRagError::EmbeddingError(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let mut result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| FusionRagError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(FusionRagError::EmbeddingError(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                result.data.len()
            )));
        }

        result.data.sort_by_key(|d| d.index);
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Generate embedding using Ollama API
    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&OllamaRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FusionRagError::EmbeddingError(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| FusionRagError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        Ok(result.embedding)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match self.provider {
            EmbeddingProvider::OpenAI => self
                .generate_openai(&[text])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    FusionRagError::EmbeddingError("No embedding in response".to_string())
                })?,
            EmbeddingProvider::Ollama => self.generate_ollama(text).await?,
        };
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = match self.provider {
            EmbeddingProvider::OpenAI => {
                let mut embeddings = Vec::with_capacity(texts.len());
                for chunk in texts.chunks(MAX_BATCH_SIZE) {
                    let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
                    embeddings.extend(self.generate_openai(&refs).await?);
                }
                embeddings
            }
            EmbeddingProvider::Ollama => {
                // Ollama doesn't support batch, so we do it with bounded concurrency
                use futures::stream::StreamExt;
                use futures::stream::{
                    self,
                };

                let concurrency = texts.len().clamp(1, OLLAMA_CONCURRENCY);
                let requests: Vec<_> = texts
                    .iter()
                    .map(|text| self.generate_ollama(text))
                    .collect();
                let results: Vec<Result<Vec<f32>>> = stream::iter(requests)
                    .buffered(concurrency)
                    .collect()
                    .await;

                results.into_iter().collect::<Result<Vec<_>>>()?
            }
        };

        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
