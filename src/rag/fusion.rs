//! Reciprocal Rank Fusion (RRF) over multiple ranked lists
//!
//! Score for document d = Σ 1/(k + rank_i) over every list i containing d,
//! with rank 1-based. Raw retriever scores are never compared across lists;
//! they only decide which occurrence represents a fused document.

use std::collections::HashMap;

use tracing::debug;

use crate::errors::FusionRagError;
use crate::errors::Result;
use crate::models::Document;
use crate::models::DocumentIdentity;
use crate::models::FusionResult;
use crate::models::RankedList;

/// Standard smoothing constant from Cormack et al. (2009)
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Accumulated state for one fused identity
struct Entry {
    score: f64,
    representative: Document,
}

/// Fuse ranked lists with Reciprocal Rank Fusion
///
/// Documents are matched by [`DocumentIdentity`]. For each identity the
/// occurrence with the highest original `score` (absent counts as 0) is kept
/// as the representative; on equal scores the first occurrence wins.
/// The output is sorted by `fusion_score` descending, ties in first-seen
/// order, and every entry carries a numeric `score`.
///
/// # Errors
/// - `InvalidParameter` if `k` is not a positive finite number
pub fn fuse(ranked_lists: &[RankedList], k: f64) -> Result<FusionResult> {
    validate_k(k)?;

    // Insertion order doubles as the tie-break order
    let mut order: Vec<DocumentIdentity> = Vec::new();
    let mut entries: HashMap<DocumentIdentity, Entry> = HashMap::new();

    for list in ranked_lists {
        for (idx, doc) in list.iter().enumerate() {
            let rank = (idx + 1) as f64;
            let contribution = 1.0 / (k + rank);
            let key = doc.identity();

            match entries.get_mut(&key) {
                Some(entry) => {
                    entry.score += contribution;
                    if doc.score_or_zero() > entry.representative.score_or_zero() {
                        entry.representative = doc.clone();
                    }
                }
                None => {
                    order.push(key.clone());
                    entries.insert(
                        key,
                        Entry {
                            score: contribution,
                            representative: doc.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<Document> = order
        .into_iter()
        .filter_map(|key| entries.remove(&key))
        .map(|entry| {
            let mut doc = entry.representative;
            doc.fusion_score = Some(entry.score);
            doc.score = Some(doc.score_or_zero());
            doc
        })
        .collect();

    // Stable sort keeps first-seen order among equal scores
    fused.sort_by(|a, b| {
        b.fusion_score
            .unwrap_or(0.0)
            .total_cmp(&a.fusion_score.unwrap_or(0.0))
    });

    debug!(
        "Fused {} ranked lists into {} documents (k = {k})",
        ranked_lists.len(),
        fused.len()
    );

    Ok(fused)
}

fn validate_k(k: f64) -> Result<()> {
    if k.is_finite() && k > 0.0 {
        Ok(())
    } else {
        Err(FusionRagError::InvalidParameter(format!(
            "RRF k must be a positive finite number, got {k}"
        )))
    }
}

/// RRF engine bound to a configured smoothing constant
#[derive(Debug, Clone, Copy)]
pub struct RankFusion {
    k: f64,
}

impl RankFusion {
    pub fn new(k: f64) -> Result<Self> {
        validate_k(k)?;
        Ok(Self { k })
    }

    pub const fn k(&self) -> f64 {
        self.k
    }

    pub fn fuse(&self, ranked_lists: &[RankedList]) -> FusionResult {
        // k was validated at construction
        fuse(ranked_lists, self.k).unwrap_or_default()
    }

    /// Fuse, then keep the first `top_k` documents
    pub fn fuse_top_k(&self, ranked_lists: &[RankedList], top_k: usize) -> FusionResult {
        let mut fused = self.fuse(ranked_lists);
        fused.truncate(top_k);
        fused
    }
}

impl Default for RankFusion {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}
