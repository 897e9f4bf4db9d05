//! Complete RAG pipeline: Expand -> Retrieve -> Fuse -> Assemble -> Generate

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cli::output::truncate_str;
use crate::config::AppConfig;
use crate::config::FusionConfig;
use crate::embeddings::Embedder;
use crate::embeddings::EmbeddingClient;
use crate::embeddings::RerankClient;
use crate::embeddings::Reranker;
use crate::errors::FusionRagError;
use crate::errors::Result;
use crate::llm::LlmClient;
use crate::llm::StructuredExtractor;
use crate::llm::TextGenerator;
use crate::models::Document;
use crate::models::FusionResult;
use crate::models::Metadata;
use crate::rag::prompts::build_answer_prompt;
use crate::rag::ContextAssembler;
use crate::rag::QueryExpander;
use crate::rag::RankFusion;
use crate::rag::Retriever;
use crate::storage::QdrantStore;
use crate::storage::VectorStore;

/// Contexts shorter than this are logged as likely to hurt answer quality
const SHORT_CONTEXT_CHARS: usize = 50;

/// Complete RAG-Fusion service
pub struct RagService {
    expander: QueryExpander,
    retriever: Retriever,
    fusion: RankFusion,
    context_assembler: ContextAssembler,
    generator: Option<Arc<dyn TextGenerator>>,
    extractor: Option<StructuredExtractor>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: FusionConfig,
    rerank_top_k: usize,
    temperature: f32,
    max_tokens: u32,
    documents_added: AtomicBool,
}

impl RagService {
    /// Create a new RAG service backed by the configured HTTP services
    ///
    /// An LLM configuration that cannot be resolved is not fatal: query
    /// expansion falls back to heuristics and answers carry an error notice.
    ///
    /// # Errors
    /// - Invalid fusion parameters
    /// - Embedding, vector store or reranker client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let timeout = config.call_timeout();
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::from_app_config(config)?);
        let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&config.vector_store, timeout)?);

        let generator: Option<Arc<dyn TextGenerator>> = match LlmClient::from_app_config(config) {
            Ok(client) => {
                info!("Using {} model {}", client.provider(), client.model());
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("LLM unavailable, continuing without generation: {}", e);
                None
            }
        };

        let reranker: Option<Arc<dyn Reranker>> = if config.reranker.enabled {
            Some(Arc::new(RerankClient::new(&config.reranker, timeout)?))
        } else {
            None
        };

        Self::from_parts(config, embedder, store, generator, reranker)
    }

    /// Create from existing collaborators
    ///
    /// # Errors
    /// - Invalid fusion parameters
    pub fn from_parts(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Option<Arc<dyn TextGenerator>>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Result<Self> {
        let fusion = RankFusion::new(config.fusion_k())?;

        let expander = match &generator {
            Some(generator) => QueryExpander::new(Arc::clone(generator)),
            None => QueryExpander::heuristic(),
        };
        let extractor = generator
            .as_ref()
            .map(|generator| StructuredExtractor::new(Arc::clone(generator)));

        let mut retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.call_timeout(),
        );
        if let Some(reranker) = reranker {
            retriever = retriever.with_reranker(reranker);
        }

        Ok(Self {
            expander,
            retriever,
            fusion,
            context_assembler: ContextAssembler::from_config(&config.context),
            generator,
            extractor,
            embedder,
            store,
            settings: config.fusion.clone(),
            rerank_top_k: config.reranker.top_k,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            documents_added: AtomicBool::new(false),
        })
    }

    /// Expand the query, retrieve for every variant concurrently and fuse
    pub async fn retrieve_fusion(
        &self,
        query: &str,
        num_queries: usize,
        top_k_per_query: usize,
        final_top_k: usize,
    ) -> (Vec<String>, FusionResult) {
        let queries = self.expander.expand(query, num_queries).await;
        debug!("Fusion queries: {:?}", queries);

        let lists = self.retriever.retrieve_many(&queries, top_k_per_query).await;
        let fused = self.fusion.fuse_top_k(&lists, final_top_k);
        info!(
            "Fused {} ranked lists into {} documents",
            lists.len(),
            fused.len()
        );
        (queries, fused)
    }

    /// Perform a RAG-Fusion query with configured defaults
    ///
    /// # Errors
    /// - Basic retrieval errors (only reachable through `query_with_options`)
    pub async fn query(&self, question: &str) -> Result<RagResponse> {
        self.query_with_options(RagQuery::new(question)).await
    }

    /// Perform a RAG query with custom options
    ///
    /// # Errors
    /// - Embedding or vector store errors on the basic retrieval path; the
    ///   fusion path degrades to empty lists instead
    pub async fn query_with_options(&self, query: RagQuery) -> Result<RagResponse> {
        info!("Processing RAG query: {}", query.question);

        // Step 1: Retrieve relevant documents
        let (queries, retrieved) = match query.method {
            RetrievalMethod::Fusion => {
                self.retrieve_fusion(
                    &query.question,
                    query.num_queries.unwrap_or(self.settings.num_queries),
                    self.settings.top_k_per_query,
                    query.top_k.unwrap_or(self.settings.final_top_k),
                )
                .await
            }
            RetrievalMethod::Basic => {
                let top_k = query.top_k.unwrap_or(self.settings.top_k_per_query);
                let docs = if query.use_reranker {
                    self.retriever
                        .retrieve_reranked(&query.question, top_k, self.rerank_top_k)
                        .await?
                } else {
                    self.retriever.retrieve(&query.question, top_k).await?
                };
                (vec![query.question.clone()], docs)
            }
        };

        // Step 2: Assemble context
        let (context, stats) = self.context_assembler.assemble_with_stats(&retrieved);
        info!(
            "Context: {} retrieved, {} unique, {} chars",
            stats.retrieved,
            stats.unique,
            context.chars().count()
        );
        if context.chars().count() < SHORT_CONTEXT_CHARS {
            warn!("Retrieved context is short, answer quality may suffer");
        }

        // Step 3: Generate answer using LLM
        let prompt = build_answer_prompt(&query.question, &context);
        let answer = match self
            .generate_answer(
                &prompt,
                query.temperature.unwrap_or(self.temperature),
                query.max_tokens.unwrap_or(self.max_tokens),
            )
            .await
        {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                format!("[LLM error: {e}]")
            }
        };

        // Step 4: Optional structured output
        let structured = match (&self.extractor, query.structured_fields.is_empty()) {
            (Some(extractor), false) => {
                Some(extractor.extract(&answer, &query.structured_fields).await)
            }
            _ => None,
        };

        info!("RAG query completed");

        Ok(RagResponse {
            query: query.question,
            queries,
            retrieved,
            context,
            answer,
            structured,
        })
    }

    async fn generate_answer(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            FusionRagError::LlmError("No LLM provider configured".to_string())
        })?;
        generator.generate(prompt, temperature, max_tokens).await
    }

    /// Embed and store documents, creating the collection when missing
    ///
    /// Once documents have been added, later calls are skipped unless `force`
    /// is set; the returned list is then empty. The guard is claimed before
    /// embedding starts, so of two concurrent unforced calls only one adds.
    /// A failed add releases the claim.
    ///
    /// # Errors
    /// - Embedding errors
    /// - Vector store errors
    pub async fn add_documents(
        &self,
        texts: &[String],
        metadatas: Option<Vec<Metadata>>,
        force: bool,
    ) -> Result<Vec<String>> {
        let claimed = !force
            && self
                .documents_added
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
        if !force && !claimed {
            warn!("Documents already added, skipping; pass force to add again");
            return Ok(Vec::new());
        }

        match self.store_documents(texts, metadatas).await {
            Ok(ids) => {
                self.documents_added.store(true, Ordering::SeqCst);
                info!("Added {} documents", ids.len());
                Ok(ids)
            }
            Err(e) => {
                if claimed {
                    self.documents_added.store(false, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    async fn store_documents(
        &self,
        texts: &[String],
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        let vectors = self.embedder.encode_batch(texts).await?;
        if self.store.create_collection(self.embedder.dimension()).await? {
            info!("Created vector collection ({} dimensions)", self.embedder.dimension());
        }
        self.store.add_documents(texts, vectors, metadatas).await
    }

    /// Drop the vector collection and allow documents to be added again
    ///
    /// # Errors
    /// - Vector store errors
    pub async fn clear(&self) -> Result<bool> {
        let deleted = self.store.delete_collection().await?;
        self.documents_added.store(false, Ordering::SeqCst);
        Ok(deleted)
    }
}

/// RAG query configuration; `None` fields use the service defaults
#[derive(Debug, Clone)]
pub struct RagQuery {
    pub question: String,
    pub method: RetrievalMethod,
    pub use_reranker: bool,
    pub num_queries: Option<usize>,
    pub top_k: Option<usize>,
    pub structured_fields: Vec<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl RagQuery {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            method: RetrievalMethod::Fusion,
            use_reranker: false,
            num_queries: None,
            top_k: None,
            structured_fields: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn basic(mut self, use_reranker: bool) -> Self {
        self.method = RetrievalMethod::Basic;
        self.use_reranker = use_reranker;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.structured_fields = fields;
        self
    }
}

/// Retrieval method for RAG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    /// Multi-query expansion plus reciprocal rank fusion
    #[default]
    Fusion,
    /// Single vector search, optionally reranked
    Basic,
}

/// RAG response
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub query: String,
    /// Queries actually searched; the expansion for fusion, the question otherwise
    pub queries: Vec<String>,
    pub retrieved: Vec<Document>,
    pub context: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

impl RagResponse {
    /// Get a formatted string representation
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Query: {}\n\n", self.query));

        if self.queries.len() > 1 {
            output.push_str("Expanded queries:\n");
            for (idx, query) in self.queries.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", idx + 1, query));
            }
            output.push('\n');
        }

        output.push_str(&format!("Answer:\n{}\n\n", self.answer));
        output.push_str(&format!("Sources ({} documents):\n", self.retrieved.len()));

        for (idx, doc) in self.retrieved.iter().enumerate().take(5) {
            output.push_str(&format!(
                "  {}. [{:.4}] {}\n",
                idx + 1,
                doc.relevance(),
                truncate_str(doc.text.trim(), 80)
            ));
        }

        if let Some(structured) = &self.structured {
            let rendered =
                serde_json::to_string_pretty(structured).unwrap_or_else(|_| structured.to_string());
            output.push_str(&format!("\nStructured output:\n{rendered}\n"));
        }

        output
    }
}
