//! Vector storage module
//!
//! [`VectorStore`] is the similarity-search seam used by retrieval.
//! [`QdrantStore`] talks to a Qdrant server over its REST API and
//! [`MemoryStore`] keeps vectors in process for local runs and tests.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use crate::errors::Result;
use crate::models::Metadata;
use crate::models::RankedList;

/// Similarity search over stored document vectors
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the backing collection; `Ok(false)` when it already exists
    async fn create_collection(&self, dimension: usize) -> Result<bool>;

    /// Store documents with their vectors, returning the assigned ids
    async fn add_documents(
        &self,
        texts: &[String],
        vectors: Vec<Vec<f32>>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>>;

    /// Nearest documents to `vector`, best first
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<RankedList>;

    /// Drop the backing collection; `Ok(false)` when there was nothing to drop
    async fn delete_collection(&self) -> Result<bool>;
}

/// Check the parallel inputs of `add_documents` line up
pub(crate) fn check_batch(
    texts: &[String],
    vectors: &[Vec<f32>],
    metadatas: Option<&Vec<Metadata>>,
) -> Result<()> {
    let metadata_len = metadatas.map_or(texts.len(), Vec::len);
    if texts.len() != vectors.len() || texts.len() != metadata_len {
        return Err(crate::FusionRagError::InvalidParameter(format!(
            "Mismatched batch: {} texts, {} vectors, {} metadata entries",
            texts.len(),
            vectors.len(),
            metadata_len
        )));
    }
    Ok(())
}
