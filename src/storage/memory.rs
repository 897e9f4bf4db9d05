//! In-process vector store with brute-force cosine search

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::FusionRagError;
use crate::errors::Result;
use crate::models::Document;
use crate::models::Metadata;
use crate::models::RankedList;
use crate::storage::check_batch;
use crate::storage::VectorStore;

struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    text: String,
    metadata: Metadata,
}

#[derive(Default)]
struct Collection {
    dimension: Option<usize>,
    points: Vec<StoredPoint>,
}

/// Vector store backed by a `Vec`, for local runs and tests
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.points.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_collection(&self, dimension: usize) -> Result<bool> {
        if dimension == 0 {
            return Err(FusionRagError::InvalidParameter(
                "Vector dimension must be greater than 0".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        if inner.dimension.is_some() {
            return Ok(false);
        }
        inner.dimension = Some(dimension);
        Ok(true)
    }

    async fn add_documents(
        &self,
        texts: &[String],
        vectors: Vec<Vec<f32>>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        check_batch(texts, &vectors, metadatas.as_ref())?;

        let mut inner = self.inner.write().await;
        let dimension = inner.dimension.ok_or_else(|| {
            FusionRagError::VectorStoreError("Collection has not been created".to_string())
        })?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(FusionRagError::VectorStoreError(format!(
                "Expected {dimension}-dimensional vectors, got {}",
                bad.len()
            )));
        }

        let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); texts.len()]);
        let mut ids = Vec::with_capacity(texts.len());
        for ((text, vector), metadata) in texts.iter().zip(vectors).zip(metadatas) {
            let id = uuid::Uuid::new_v4().to_string();
            ids.push(id.clone());
            inner.points.push(StoredPoint {
                id,
                vector,
                text: text.clone(),
                metadata,
            });
        }
        Ok(ids)
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<RankedList> {
        let inner = self.inner.read().await;
        let mut scored: Vec<(f64, &StoredPoint)> = inner
            .points
            .iter()
            .map(|p| (cosine_similarity(vector, &p.vector), p))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, p)| Document {
                id: Some(p.id.clone()),
                text: p.text.clone(),
                score: Some(score),
                metadata: p.metadata.clone(),
                fusion_score: None,
                rerank_score: None,
            })
            .collect())
    }

    async fn delete_collection(&self) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.dimension.is_some();
        *inner = Collection::default();
        Ok(existed)
    }
}

/// Cosine similarity, 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
