//! Retrieval data model: documents, identities and ranked lists

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// Free-form document metadata, passed through unmodified
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Documents in decreasing relevance order, as returned by one retrieval call
pub type RankedList = Vec<Document>;

/// Fused documents ordered by `fusion_score` descending
pub type FusionResult = Vec<Document>;

/// A candidate retrieval result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Original similarity score, scale defined by the retriever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The id, if present and non-empty
    pub fn stable_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Original score, 0.0 when absent
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// Best available relevance indicator: fusion, then rerank, then original score
    pub fn relevance(&self) -> f64 {
        self.fusion_score
            .or(self.rerank_score)
            .or(self.score)
            .unwrap_or(0.0)
    }

    pub fn identity(&self) -> DocumentIdentity {
        DocumentIdentity::of(self)
    }
}

/// Key used to recognize the same document across independent ranked lists
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentIdentity {
    /// Retriever-assigned id
    Id(String),
    /// Hex SHA-256 of the trimmed text, for documents without an id
    ContentHash(String),
}

impl DocumentIdentity {
    pub fn of(doc: &Document) -> Self {
        match doc.stable_id() {
            Some(id) => Self::Id(id.to_string()),
            None => Self::ContentHash(content_hash(&doc.text)),
        }
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::ContentHash(hash) => write!(f, "sha256:{}", &hash[..12.min(hash.len())]),
        }
    }
}

/// Hex SHA-256 digest of the trimmed text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hex::encode(hasher.finalize())
}
