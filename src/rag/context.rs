//! Context assembly from retrieved documents

use std::collections::HashSet;

use tracing::debug;
use tracing::warn;

use crate::config::ContextConfig;
use crate::models::Document;

const ENTRY_SEPARATOR: &str = "\n\n";

/// Counts reported alongside an assembled context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    /// Documents handed to the assembler
    pub retrieved: usize,
    /// Distinct non-empty documents after deduplication
    pub unique: usize,
    /// Entries that made it into the context block
    pub used: usize,
}

/// Assembler for creating an LLM context block from documents
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_context_length: usize,
    fallback_prefix: usize,
    annotate_scores: bool,
}

impl ContextAssembler {
    /// Create a new context assembler
    #[must_use]
    pub const fn new(max_context_length: usize) -> Self {
        Self {
            max_context_length,
            fallback_prefix: 5,
            annotate_scores: true,
        }
    }

    #[must_use]
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            max_context_length: config.max_context_length,
            fallback_prefix: config.fallback_prefix,
            annotate_scores: config.annotate_scores,
        }
    }

    #[must_use]
    pub const fn with_fallback_prefix(mut self, fallback_prefix: usize) -> Self {
        self.fallback_prefix = fallback_prefix;
        self
    }

    #[must_use]
    pub const fn with_annotations(mut self, annotate_scores: bool) -> Self {
        self.annotate_scores = annotate_scores;
        self
    }

    /// Assemble context from documents
    #[must_use]
    pub fn assemble(&self, docs: &[Document]) -> String {
        self.assemble_with_stats(docs).0
    }

    /// Assemble context and report how many documents were used
    ///
    /// Documents are deduplicated by identity in input order and empty
    /// texts are skipped. If nothing survives, the first `fallback_prefix`
    /// inputs are used as-is.
    #[must_use]
    pub fn assemble_with_stats(&self, docs: &[Document]) -> (String, ContextStats) {
        let mut seen = HashSet::new();
        let unique: Vec<&Document> = docs
            .iter()
            .filter(|doc| !doc.text.trim().is_empty())
            .filter(|doc| seen.insert(doc.identity()))
            .collect();
        let unique_count = unique.len();

        let selected: Vec<&Document> = if unique.is_empty() {
            if !docs.is_empty() {
                warn!(
                    "No usable documents after deduplication, falling back to first {}",
                    self.fallback_prefix
                );
            }
            // Blank texts are still skipped below, so an all-blank input
            // renders an empty context even through the fallback
            docs.iter().take(self.fallback_prefix).collect()
        } else {
            unique
        };

        let mut context = String::new();
        let mut length = 0;
        let mut used = 0;
        for doc in selected.into_iter().filter(|d| !d.text.trim().is_empty()) {
            let entry = self.format_entry(used + 1, doc);
            let entry_length = entry.chars().count();
            let added = if used == 0 {
                entry_length
            } else {
                entry_length + ENTRY_SEPARATOR.len()
            };

            if used > 0 && length + added > self.max_context_length {
                debug!("Context length limit reached after {} entries", used);
                break;
            }

            if used > 0 {
                context.push_str(ENTRY_SEPARATOR);
            }
            context.push_str(&entry);
            length += added;
            used += 1;
        }

        let stats = ContextStats {
            retrieved: docs.len(),
            unique: unique_count,
            used,
        };
        debug!(
            "Assembled context: {} retrieved, {} unique, {} used",
            stats.retrieved, stats.unique, stats.used
        );
        (context, stats)
    }

    fn format_entry(&self, position: usize, doc: &Document) -> String {
        let text = doc.text.trim();
        if self.annotate_scores {
            format!(
                "Document {position} (relevance: {:.3}): {text}",
                doc.relevance()
            )
        } else {
            text.to_string()
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fused(id: &str, text: &str, score: f64) -> Document {
        let mut doc = Document::new(text).with_id(id);
        doc.fusion_score = Some(score);
        doc
    }

    #[test]
    fn test_formats_with_relevance() {
        let docs = vec![fused("a", "Paris is the capital", 0.0328), fused("b", "Lyon", 0.016)];
        let context = ContextAssembler::default().assemble(&docs);
        assert_eq!(
            context,
            "Document 1 (relevance: 0.033): Paris is the capital\n\nDocument 2 (relevance: 0.016): Lyon"
        );
    }

    #[test]
    fn test_deduplicates_and_skips_empty() {
        let docs = vec![
            fused("a", "first", 0.3),
            fused("b", "   ", 0.2),
            fused("a", "first again", 0.1),
            Document::new(" shared "),
            Document::new("shared"),
        ];
        let (context, stats) = ContextAssembler::default().assemble_with_stats(&docs);
        assert_eq!(
            stats,
            ContextStats {
                retrieved: 5,
                unique: 2,
                used: 2
            }
        );
        assert!(context.contains("Document 1 (relevance: 0.300): first"));
        assert!(context.contains("Document 2 (relevance: 0.000): shared"));
        assert!(!context.contains("first again"));
    }

    #[test]
    fn test_plain_entries_without_annotations() {
        let docs = vec![Document::new("one"), Document::new("two")];
        let context = ContextAssembler::default()
            .with_annotations(false)
            .assemble(&docs);
        assert_eq!(context, "one\n\ntwo");
    }

    #[test]
    fn test_empty_input() {
        let (context, stats) = ContextAssembler::default().assemble_with_stats(&[]);
        assert!(context.is_empty());
        assert_eq!(stats, ContextStats::default());
    }

    #[test]
    fn test_all_empty_texts_yield_empty_context() {
        let docs = vec![Document::new(""), Document::new("  ")];
        let (context, stats) = ContextAssembler::default().assemble_with_stats(&docs);
        assert!(context.is_empty());
        assert_eq!(stats.retrieved, 2);
        assert_eq!(stats.unique, 0);
        assert_eq!(stats.used, 0);

        let (context, stats) = ContextAssembler::default()
            .with_fallback_prefix(1)
            .assemble_with_stats(&docs);
        assert!(context.is_empty());
        assert_eq!(stats.used, 0);
    }

    #[test]
    fn test_length_limit_keeps_first_entry() {
        let long = "x".repeat(50);
        let docs = vec![
            Document::new(long.clone()).with_id("1"),
            Document::new("short").with_id("2"),
        ];
        let assembler = ContextAssembler::new(20).with_annotations(false);
        let (context, stats) = assembler.assemble_with_stats(&docs);
        assert_eq!(context, long);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.unique, 2);
    }

    #[test]
    fn test_length_limit_counts_separator() {
        let docs = vec![Document::new("aaaa"), Document::new("bbbb")];
        let exact = ContextAssembler::new(10).with_annotations(false);
        assert_eq!(exact.assemble(&docs), "aaaa\n\nbbbb");
        let short = ContextAssembler::new(9).with_annotations(false);
        assert_eq!(short.assemble(&docs), "aaaa");
    }

    #[test]
    fn test_from_config() {
        let config = ContextConfig {
            max_context_length: 100,
            fallback_prefix: 2,
            annotate_scores: false,
        };
        let assembler = ContextAssembler::from_config(&config);
        assert_eq!(assembler.max_context_length, 100);
        assert_eq!(assembler.fallback_prefix, 2);
        assert!(!assembler.annotate_scores);
    }
}
