//! RAG (Retrieval-Augmented Generation) module
//!
//! This module provides the RAG-Fusion pipeline:
//! - Multi-query expansion through an LLM, with heuristic fallback
//! - Concurrent vector retrieval per expanded query
//! - Reciprocal rank fusion with id-first deduplication
//! - Context assembly and LLM-based answer generation
//!
//! # Examples
//!
//! ```rust,no_run
//! use fusionrag::config::AppConfig;
//! use fusionrag::rag::RagService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::new(&config)?;
//!
//!     let response = service.query("What is reciprocal rank fusion?").await?;
//!     println!("Answer: {}", response.answer);
//!     println!("Sources: {} documents", response.retrieved.len());
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod expander;
pub mod fusion;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use context::ContextAssembler;
pub use context::ContextStats;
pub use expander::QueryExpander;
pub use fusion::fuse;
pub use fusion::RankFusion;
pub use pipeline::RagQuery;
pub use pipeline::RagResponse;
pub use pipeline::RagService;
pub use pipeline::RetrievalMethod;
pub use retriever::Retriever;
