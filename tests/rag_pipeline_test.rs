use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fusionrag::embeddings::Embedder;
use fusionrag::embeddings::Reranker;
use fusionrag::llm::TextGenerator;
use fusionrag::models::Document;
use fusionrag::models::Metadata;
use fusionrag::models::RankedList;
use fusionrag::rag::RagQuery;
use fusionrag::rag::RagService;
use fusionrag::storage::MemoryStore;
use fusionrag::storage::VectorStore;
use fusionrag::AppConfig;
use fusionrag::FusionRagError;
use fusionrag::Result;

/// Maps each known query to a one-dimensional vector holding its index
struct ScriptedEmbedder {
    queries: Vec<&'static str>,
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("broken") {
            return Err(FusionRagError::EmbeddingError("embedding service down".to_string()));
        }
        if text.contains("slow") {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        let index = self
            .queries
            .iter()
            .position(|q| *q == text)
            .unwrap_or(usize::MAX);
        Ok(vec![index as f32])
    }

    fn dimension(&self) -> usize {
        1
    }
}

/// Returns a prepared ranked list per query index
struct ScriptedStore {
    lists: Vec<RankedList>,
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn create_collection(&self, _dimension: usize) -> Result<bool> {
        Ok(false)
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
        let index = vector[0] as usize;
        Ok(self
            .lists
            .get(index)
            .map(|list| list.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_collection(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Answers expansion prompts with fixed lines and everything else with a fixed answer
struct FakeLlm {
    expansion: &'static str,
    answer: &'static str,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn new(expansion: &'static str, answer: &'static str) -> Arc<Self> {
        Arc::new(Self {
            expansion,
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn answer_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.starts_with("Answer the question"))
            .cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeLlm {
    async fn generate(&self, prompt: &str, _temperature: f32, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("Original question:") {
            Ok(self.expansion.to_string())
        } else if prompt.starts_with("Extract the following fields") {
            Ok("```json\n{\"method\": \"RRF\"}\n```".to_string())
        } else {
            Ok(self.answer.to_string())
        }
    }
}

/// Scores documents by their position from the end
struct ReverseReranker;

#[async_trait]
impl Reranker for ReverseReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<(usize, f64)>> {
        let mut hits: Vec<(usize, f64)> =
            (0..documents.len()).rev().map(|i| (i, i as f64 + 0.5)).collect();
        hits.truncate(top_k.unwrap_or(hits.len()));
        Ok(hits)
    }
}

fn doc(id: &str, text: &str, score: f64) -> Document {
    Document::new(text).with_id(id).with_score(score)
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.fusion.call_timeout_secs = 1;
    config
}

fn service(
    queries: Vec<&'static str>,
    lists: Vec<RankedList>,
    llm: Option<Arc<FakeLlm>>,
    reranker: Option<Arc<dyn Reranker>>,
) -> Result<RagService> {
    let generator = llm.map(|llm| llm as Arc<dyn TextGenerator>);
    RagService::from_parts(
        &test_config(),
        Arc::new(ScriptedEmbedder { queries }),
        Arc::new(ScriptedStore { lists }),
        generator,
        reranker,
    )
}

fn three_lists() -> Vec<RankedList> {
    vec![
        vec![doc("A", "alpha", 0.9), doc("B", "beta", 0.8), doc("C", "gamma", 0.7)],
        vec![doc("B", "beta", 0.95), doc("A", "alpha", 0.6)],
        vec![doc("C", "gamma", 0.85), doc("B", "beta", 0.5)],
    ]
}

#[tokio::test]
async fn test_fusion_query_end_to_end() -> Result<()> {
    let llm = FakeLlm::new("related one\nrelated two", "Beta is the answer.");
    let service = service(
        vec!["what is beta", "related one", "related two"],
        three_lists(),
        Some(llm.clone()),
        None,
    )?;

    let response = service.query("what is beta").await?;

    assert_eq!(response.queries, vec!["what is beta", "related one", "related two"]);
    let ids: Vec<&str> = response
        .retrieved
        .iter()
        .filter_map(|d| d.id.as_deref())
        .collect();
    assert_eq!(ids, vec!["B", "A", "C"]);

    let expected_b = 1.0 / 61.0 + 1.0 / 62.0 + 1.0 / 62.0;
    let fused_b = response.retrieved[0].fusion_score.unwrap();
    assert!((fused_b - expected_b).abs() < 1e-12);
    // Highest original score among the copies of B
    assert_eq!(response.retrieved[0].score, Some(0.95));

    assert!(response.context.starts_with("Document 1 (relevance: 0.049): beta"));
    assert_eq!(response.answer, "Beta is the answer.");
    assert!(response.structured.is_none());

    let prompt = llm.answer_prompt().unwrap();
    assert!(prompt.contains("Question: what is beta"));
    assert!(prompt.contains("Document 3 (relevance: 0.032): gamma"));
    Ok(())
}

#[tokio::test]
async fn test_failed_and_timed_out_retrievals_are_skipped() -> Result<()> {
    let llm = FakeLlm::new("broken query\nslow query", "ok");
    let service = service(vec!["question"], three_lists(), Some(llm), None)?;

    let response = service.query("question").await?;

    assert_eq!(response.queries.len(), 3);
    let ids: Vec<&str> = response
        .retrieved
        .iter()
        .filter_map(|d| d.id.as_deref())
        .collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert!((response.retrieved[0].fusion_score.unwrap() - 1.0 / 61.0).abs() < 1e-12);
    Ok(())
}

#[tokio::test]
async fn test_all_retrievals_failing_still_answers() -> Result<()> {
    let llm = FakeLlm::new("broken one\nbroken two", "I cannot answer this question.");
    let service = service(vec![], Vec::new(), Some(llm.clone()), None)?;

    let response = service.query("broken question").await?;

    assert!(response.retrieved.is_empty());
    assert!(response.context.is_empty());
    assert_eq!(response.answer, "I cannot answer this question.");
    assert!(llm.answer_prompt().unwrap().contains("Context:\n\n"));
    Ok(())
}

#[tokio::test]
async fn test_without_llm_uses_heuristics_and_reports_error() -> Result<()> {
    let service = service(vec!["rrf"], three_lists(), None, None)?;

    let response = service.query("rrf").await?;

    assert_eq!(response.queries.len(), 3);
    assert_eq!(response.queries[0], "rrf");
    assert_eq!(response.retrieved.len(), 3);
    assert!(response.answer.starts_with("[LLM error:"));
    Ok(())
}

#[tokio::test]
async fn test_structured_fields_extracted_from_answer() -> Result<()> {
    let llm = FakeLlm::new("", "Reciprocal rank fusion.");
    let service = service(vec!["q"], three_lists(), Some(llm), None)?;

    let query = RagQuery::new("q").with_fields(vec!["method".to_string()]);
    let response = service.query_with_options(query).await?;

    let structured = response.structured.unwrap();
    assert_eq!(structured["method"], "RRF");
    Ok(())
}

#[tokio::test]
async fn test_basic_retrieval_with_reranker() -> Result<()> {
    let llm = FakeLlm::new("", "answer");
    let service = service(
        vec!["q"],
        three_lists(),
        Some(llm),
        Some(Arc::new(ReverseReranker)),
    )?;

    let response = service
        .query_with_options(RagQuery::new("q").basic(true))
        .await?;

    assert_eq!(response.queries, vec!["q"]);
    // reranker.top_k defaults to 3
    let ids: Vec<&str> = response
        .retrieved
        .iter()
        .filter_map(|d| d.id.as_deref())
        .collect();
    assert_eq!(ids, vec!["C", "B", "A"]);
    assert_eq!(response.retrieved[0].rerank_score, Some(2.5));
    assert!(response.context.starts_with("Document 1 (relevance: 2.500): gamma"));
    Ok(())
}

#[tokio::test]
async fn test_basic_retrieval_propagates_errors() -> Result<()> {
    let service = service(vec![], Vec::new(), None, None)?;
    let result = service
        .query_with_options(RagQuery::new("broken").basic(false))
        .await;
    assert!(matches!(result, Err(FusionRagError::EmbeddingError(_))));
    Ok(())
}

/// Bag-of-letters embedding so similar strings land close together
struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut counts: HashMap<char, f32> = HashMap::new();
        for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
            *counts.entry(c).or_default() += 1.0;
        }
        Ok(('a'..='z')
            .map(|c| counts.get(&c).copied().unwrap_or(0.0))
            .collect())
    }

    fn dimension(&self) -> usize {
        26
    }
}

#[tokio::test]
async fn test_add_documents_then_query_memory_store() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let llm = FakeLlm::new("", "answer");
    let service = RagService::from_parts(
        &test_config(),
        Arc::new(LetterEmbedder),
        store.clone(),
        Some(llm as Arc<dyn TextGenerator>),
        None,
    )?;

    let texts = vec![
        "zzz zebra zone".to_string(),
        "apple banana".to_string(),
        "quick quiz".to_string(),
    ];
    let ids = service.add_documents(&texts, None, false).await?;
    assert_eq!(ids.len(), 3);
    assert_eq!(store.len().await, 3);

    // Second add is skipped unless forced
    assert!(service.add_documents(&texts, None, false).await?.is_empty());
    assert_eq!(store.len().await, 3);
    assert_eq!(service.add_documents(&texts[..1], None, true).await?.len(), 1);
    assert_eq!(store.len().await, 4);

    let response = service
        .query_with_options(RagQuery::new("zebra").basic(false))
        .await?;
    assert_eq!(response.retrieved[0].text, "zzz zebra zone");

    assert!(service.clear().await?);
    assert!(store.is_empty().await);
    assert_eq!(service.add_documents(&texts, None, false).await?.len(), 3);
    Ok(())
}

/// Letter embedding that takes a while and rejects texts containing "broken"
struct SlowLetterEmbedder;

#[async_trait]
impl Embedder for SlowLetterEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if text.contains("broken") {
            return Err(FusionRagError::EmbeddingError("rejected".to_string()));
        }
        LetterEmbedder.encode(text).await
    }

    fn dimension(&self) -> usize {
        26
    }
}

#[tokio::test]
async fn test_concurrent_adds_store_documents_once() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = RagService::from_parts(
        &test_config(),
        Arc::new(SlowLetterEmbedder),
        store.clone(),
        None,
        None,
    )?;

    let texts = vec!["first doc".to_string(), "second doc".to_string()];
    let (left, right) = tokio::join!(
        service.add_documents(&texts, None, false),
        service.add_documents(&texts, None, false),
    );

    let mut added = vec![left?.len(), right?.len()];
    added.sort_unstable();
    assert_eq!(added, vec![0, 2]);
    assert_eq!(store.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_add_releases_guard() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = RagService::from_parts(
        &test_config(),
        Arc::new(SlowLetterEmbedder),
        store.clone(),
        None,
        None,
    )?;

    let result = service
        .add_documents(&["broken doc".to_string()], None, false)
        .await;
    assert!(matches!(result, Err(FusionRagError::EmbeddingError(_))));
    assert!(store.is_empty().await);

    let ids = service
        .add_documents(&["good doc".to_string()], None, false)
        .await?;
    assert_eq!(ids.len(), 1);
    Ok(())
}
