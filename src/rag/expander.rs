//! Multi-query expansion for RAG-Fusion

use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::llm::TextGenerator;
use crate::rag::prompts::build_expansion_prompt;

const DEFAULT_EXPANSION_TEMPERATURE: f32 = 0.7;
const DEFAULT_EXPANSION_MAX_TOKENS: u32 = 500;

/// Turns one query into several related queries
///
/// Always returns at least the original query: generator failures are
/// logged and replaced by templated rephrasings.
pub struct QueryExpander {
    generator: Option<Arc<dyn TextGenerator>>,
    temperature: f32,
    max_tokens: u32,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            temperature: DEFAULT_EXPANSION_TEMPERATURE,
            max_tokens: DEFAULT_EXPANSION_MAX_TOKENS,
        }
    }

    /// Expander with no generator; always uses the heuristic fallback
    pub fn heuristic() -> Self {
        Self {
            generator: None,
            temperature: DEFAULT_EXPANSION_TEMPERATURE,
            max_tokens: DEFAULT_EXPANSION_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Expand `original_query` into at most `count` queries (at least one)
    pub async fn expand(&self, original_query: &str, count: usize) -> Vec<String> {
        let count = count.max(1);

        let Some(generator) = &self.generator else {
            debug!("No text generator configured, using heuristic expansion");
            return heuristic_queries(original_query, count);
        };

        let prompt = build_expansion_prompt(original_query, count);
        let queries = match generator
            .generate(&prompt, self.temperature, self.max_tokens)
            .await
        {
            Ok(response) => parse_generated_queries(original_query, &response, count),
            Err(e) => {
                warn!("Query expansion failed, using heuristic fallback: {}", e);
                return heuristic_queries(original_query, count);
            }
        };

        match queries {
            Some(queries) => {
                info!("Expanded query into {} queries", queries.len());
                queries
            }
            None => {
                warn!("Query expansion returned no usable lines, using heuristic fallback");
                heuristic_queries(original_query, count)
            }
        }
    }
}

/// Original query plus templated rephrasings, truncated to `count`
pub fn heuristic_queries(original_query: &str, count: usize) -> Vec<String> {
    let mut queries = vec![
        original_query.to_string(),
        format!("Please explain {original_query} in detail"),
        format!("What can you tell me about {original_query}?"),
    ];
    queries.truncate(count.max(1));
    queries
}

/// One query per line, original first; `None` when the response has no usable line
fn parse_generated_queries(
    original_query: &str,
    response: &str,
    count: usize,
) -> Option<Vec<String>> {
    let mut queries: Vec<String> = Vec::new();
    for line in response.lines() {
        let query = strip_list_marker(line.trim());
        if !query.is_empty() && !queries.iter().any(|q| q == query) {
            queries.push(query.to_string());
        }
    }

    if queries.is_empty() {
        return None;
    }

    // Original always leads, wherever the generator echoed it
    queries.retain(|q| q != original_query);
    queries.insert(0, original_query.to_string());
    queries.truncate(count);
    Some(queries)
}

/// Strip a leading `1.`, `2)`, `-` or `*` list marker
fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix(&['-', '*', '•'][..]) {
        return rest.trim_start();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(&['.', ')', '、'][..]) {
            return rest.trim_start();
        }
    }
    line
}
