//! Cross-encoder reranking client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::RerankerConfig;
use crate::errors::FusionRagError;
use crate::errors::Result;

/// Scores query/document pairs
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Return `(index, score)` pairs ordered by score descending, at most `top_k`
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<(usize, f64)>>;
}

/// Client for rerank services exposing `POST /rerank`
pub struct RerankClient {
    endpoint: String,
    model: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    score: f64,
}

impl RerankClient {
    pub fn new(config: &RerankerConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FusionRagError::HttpError(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl Reranker for RerankClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<(usize, f64)>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(Serialize)]
        struct RerankRequest<'a> {
            query: &'a str,
            texts: &'a [String],
            model: &'a str,
        }

        let url = format!("{}/rerank", self.endpoint);
        debug!("Calling rerank API: {} ({} documents)", url, documents.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&RerankRequest {
                query,
                texts: documents,
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
            return Err(FusionRagError::RerankError(format!(
                "Rerank API error ({status}): {error_text}"
            )));
        }

        let hits: Vec<RerankHit> = response
            .json()
            .await
            .map_err(|e| FusionRagError::RerankError(format!("Failed to parse response: {e}")))?;

        order_hits(hits, documents.len(), top_k)
    }
}

/// Sort by score descending and truncate; reject indexes outside the request
fn order_hits(hits: Vec<RerankHit>, len: usize, top_k: Option<usize>) -> Result<Vec<(usize, f64)>> {
    if let Some(bad) = hits.iter().find(|h| h.index >= len) {
        return Err(FusionRagError::RerankError(format!(
            "Rerank response index {} out of range for {len} documents",
            bad.index
        )));
    }

    let mut ranked: Vec<(usize, f64)> = hits.into_iter().map(|h| (h.index, h.score)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    if let Some(top_k) = top_k {
        ranked.truncate(top_k);
    }
    Ok(ranked)
}
