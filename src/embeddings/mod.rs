//! Embeddings and reranking module
//!
//! This module provides the embedding and reranking collaborators used by retrieval:
//! - OpenAI-compatible embeddings API (text-embedding-3-small, etc.)
//! - Ollama (local models such as bge-large)
//! - Cross-encoder rerank services speaking the `/rerank` protocol
//!
//! # Examples
//!
//! ```rust,no_run
//! use fusionrag::config::AppConfig;
//! use fusionrag::embeddings::{Embedder, EmbeddingClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = EmbeddingClient::from_app_config(&config)?;
//!
//!     let embedding = client.encode("Hello, world!").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod reranker;

use async_trait::async_trait;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use reranker::RerankClient;
pub use reranker::Reranker;

use crate::errors::Result;

/// Maximum batch size for embedding generation
pub const MAX_BATCH_SIZE: usize = 100;

/// Turns text into fixed-dimension vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.encode(text).await?);
        }
        Ok(embeddings)
    }

    /// Output dimensionality
    fn dimension(&self) -> usize;
}
