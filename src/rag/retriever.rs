//! Vector retrieval with concurrent multi-query fan-out

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::embeddings::Embedder;
use crate::embeddings::Reranker;
use crate::errors::FusionRagError;
use crate::errors::Result;
use crate::models::RankedList;
use crate::storage::VectorStore;

/// Embeds queries and searches the vector store
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
    call_timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            reranker: None,
            call_timeout,
        }
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Embed `query` and return the `top_k` nearest documents
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<RankedList> {
        debug!("Retrieving top {} for query: {}", top_k, query);
        let vector = self.embedder.encode(query).await?;
        self.store.search(&vector, top_k).await
    }

    /// Retrieve for every query concurrently, one list per query in input order
    ///
    /// A retrieval that fails or exceeds the call timeout contributes an
    /// empty list.
    pub async fn retrieve_many(&self, queries: &[String], top_k: usize) -> Vec<RankedList> {
        let tasks = queries.iter().map(|query| async move {
            match tokio::time::timeout(self.call_timeout, self.retrieve(query, top_k)).await {
                Ok(Ok(docs)) => docs,
                Ok(Err(e)) => {
                    warn!("Retrieval failed for '{}': {}", query, e);
                    Vec::new()
                }
                Err(_) => {
                    warn!(
                        "Retrieval timed out after {:?} for '{}'",
                        self.call_timeout, query
                    );
                    Vec::new()
                }
            }
        });

        let lists = join_all(tasks).await;
        info!(
            "Retrieved {} documents across {} queries",
            lists.iter().map(Vec::len).sum::<usize>(),
            lists.len()
        );
        lists
    }

    /// Vector search followed by optional reranking
    ///
    /// Reranked documents carry `rerank_score` and follow the reranker's
    /// order. When no reranker is set or it fails, the vector order is kept
    /// and truncated to `rerank_top_k`.
    pub async fn retrieve_reranked(
        &self,
        query: &str,
        top_k: usize,
        rerank_top_k: usize,
    ) -> Result<RankedList> {
        let mut docs = self.retrieve(query, top_k).await?;

        let Some(reranker) = &self.reranker else {
            docs.truncate(rerank_top_k);
            return Ok(docs);
        };
        if docs.is_empty() {
            return Ok(docs);
        }

        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let reranked = tokio::time::timeout(
            self.call_timeout,
            reranker.rerank(query, &texts, Some(rerank_top_k)),
        )
        .await
        .unwrap_or_else(|_| {
            Err(FusionRagError::Timeout(format!(
                "Rerank exceeded {:?}",
                self.call_timeout
            )))
        });

        match reranked {
            Ok(hits) => {
                debug!("Reranked {} documents to {}", docs.len(), hits.len());
                Ok(hits
                    .into_iter()
                    .filter_map(|(index, score)| {
                        docs.get(index).map(|doc| {
                            let mut doc = doc.clone();
                            doc.rerank_score = Some(score);
                            doc
                        })
                    })
                    .collect())
            }
            Err(e) => {
                warn!("Rerank failed, keeping vector order: {}", e);
                docs.truncate(rerank_top_k);
                Ok(docs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::Document;
    use crate::models::Metadata;

    /// Embeds a query as its length, failing on queries containing "fail"
    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("fail") {
                return Err(FusionRagError::EmbeddingError("boom".to_string()));
            }
            if text.contains("slow") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(vec![text.len() as f32])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    /// Returns `top_k` documents named after the query vector
    struct EchoStore;

    #[async_trait]
    impl VectorStore for EchoStore {
        async fn create_collection(&self, _dimension: usize) -> Result<bool> {
            Ok(true)
        }

        async fn add_documents(
            &self,
            _texts: &[String],
            _vectors: Vec<Vec<f32>>,
            _metadatas: Option<Vec<Metadata>>,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn search(&self, vector: &[f32], top_k: usize) -> Result<RankedList> {
            Ok((0..top_k)
                .map(|i| {
                    Document::new(format!("doc {i} for {}", vector[0]))
                        .with_id(format!("{}-{i}", vector[0]))
                        .with_score(1.0 - i as f64 * 0.1)
                })
                .collect())
        }

        async fn delete_collection(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct ReverseReranker {
        fail: bool,
    }

    #[async_trait]
    impl Reranker for ReverseReranker {
        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
            top_k: Option<usize>,
        ) -> Result<Vec<(usize, f64)>> {
            if self.fail {
                return Err(FusionRagError::RerankError("service down".to_string()));
            }
            let mut hits: Vec<(usize, f64)> = (0..documents.len())
                .rev()
                .map(|i| (i, i as f64))
                .collect();
            hits.truncate(top_k.unwrap_or(hits.len()));
            Ok(hits)
        }
    }

    fn retriever() -> Retriever {
        Retriever::new(
            Arc::new(LengthEmbedder),
            Arc::new(EchoStore),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_retrieve_many_keeps_query_order() {
        let queries = vec!["a".to_string(), "bbb".to_string()];
        let lists = retriever().retrieve_many(&queries, 2).await;
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0][0].id.as_deref(), Some("1-0"));
        assert_eq!(lists[1][0].id.as_deref(), Some("3-0"));
    }

    #[tokio::test]
    async fn test_failed_and_slow_queries_yield_empty_lists() {
        let queries = vec![
            "ok".to_string(),
            "please fail".to_string(),
            "slow query".to_string(),
        ];
        let lists = retriever().retrieve_many(&queries, 3).await;
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0].len(), 3);
        assert!(lists[1].is_empty());
        assert!(lists[2].is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_propagates_errors() {
        let result = retriever().retrieve("fail", 3).await;
        assert!(matches!(result, Err(FusionRagError::EmbeddingError(_))));
    }

    #[tokio::test]
    async fn test_reranked_sets_scores_and_order() {
        let retriever = retriever().with_reranker(Arc::new(ReverseReranker { fail: false }));
        assert!(retriever.has_reranker());

        let docs = retriever.retrieve_reranked("q", 4, 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id.as_deref(), Some("1-3"));
        assert_eq!(docs[0].rerank_score, Some(3.0));
        assert_eq!(docs[1].id.as_deref(), Some("1-2"));
    }

    #[tokio::test]
    async fn test_rerank_failure_keeps_vector_order() {
        let retriever = retriever().with_reranker(Arc::new(ReverseReranker { fail: true }));
        let docs = retriever.retrieve_reranked("q", 4, 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id.as_deref(), Some("1-0"));
        assert!(docs.iter().all(|d| d.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_without_reranker_truncates() {
        let docs = retriever().retrieve_reranked("q", 5, 3).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2].id.as_deref(), Some("1-2"));
    }
}
