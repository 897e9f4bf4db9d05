//! Qdrant REST API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use crate::config::VectorStoreConfig;
use crate::errors::FusionRagError;
use crate::errors::Result;
use crate::models::Document;
use crate::models::Metadata;
use crate::models::RankedList;
use crate::storage::check_batch;
use crate::storage::VectorStore;

/// Payload key holding the document text
const TEXT_KEY: &str = "text";

/// Qdrant collection wrapper
pub struct QdrantStore {
    url: String,
    collection: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f64,
    #[serde(default)]
    payload: Option<Metadata>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: String,
    vector: &'a [f32],
    payload: Metadata,
}

impl QdrantStore {
    pub fn new(config: &VectorStoreConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FusionRagError::HttpError(e.to_string()))?;

        info!("Using Qdrant at {} (collection {})", config.url, config.collection);

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.url, self.collection)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn error_for(response: reqwest::Response, action: &str) -> FusionRagError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        FusionRagError::VectorStoreError(format!("Qdrant {action} failed ({status}): {error_text}"))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(&self, dimension: usize) -> Result<bool> {
        if dimension == 0 {
            return Err(FusionRagError::InvalidParameter(
                "Vector dimension must be greater than 0".to_string(),
            ));
        }

        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        let response = self
            .with_auth(self.client.put(self.collection_url()))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Collection '{}' created", self.collection);
                Ok(true)
            }
            StatusCode::CONFLICT => {
                debug!("Collection '{}' already exists", self.collection);
                Ok(false)
            }
            _ => {
                let error = Self::error_for(response, "create collection").await;
                // Older servers answer 400 for an existing collection
                if error.to_string().contains("already exists") {
                    Ok(false)
                } else {
                    Err(error)
                }
            }
        }
    }

    async fn add_documents(
        &self,
        texts: &[String],
        vectors: Vec<Vec<f32>>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        check_batch(texts, &vectors, metadatas.as_ref())?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); texts.len()]);
        let points: Vec<Point<'_>> = texts
            .iter()
            .zip(&vectors)
            .zip(metadatas)
            .map(|((text, vector), metadata)| Point {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload: build_payload(text, metadata),
            })
            .collect();
        let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();

        let url = format!("{}/points?wait=true", self.collection_url());
        let response = self
            .with_auth(self.client.put(&url))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "upsert").await);
        }

        info!("Added {} documents to collection '{}'", ids.len(), self.collection);
        Ok(ids)
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<RankedList> {
        let url = format!("{}/points/search", self.collection_url());
        debug!("Searching Qdrant: {} (top_k = {})", url, top_k);

        let response = self
            .with_auth(self.client.post(&url))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "search").await);
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            FusionRagError::VectorStoreError(format!("Failed to parse search response: {e}"))
        })?;

        Ok(body.result.into_iter().map(point_to_document).collect())
    }

    async fn delete_collection(&self) -> Result<bool> {
        let response = self
            .with_auth(self.client.delete(self.collection_url()))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Collection '{}' deleted", self.collection);
                Ok(true)
            }
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_for(response, "delete collection").await),
        }
    }
}

fn build_payload(text: &str, metadata: Metadata) -> Metadata {
    let mut payload = metadata;
    payload.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    payload
}

/// Payload `text` becomes the document text, every other key is metadata
fn point_to_document(point: ScoredPoint) -> Document {
    let mut metadata = point.payload.unwrap_or_default();
    let text = match metadata.remove(TEXT_KEY) {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let id = match point.id {
        Value::String(id) => id,
        other => other.to_string(),
    };

    Document {
        id: Some(id),
        text,
        score: Some(point.score),
        metadata,
        fusion_score: None,
        rerank_score: None,
    }
}
