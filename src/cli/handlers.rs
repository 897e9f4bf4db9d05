//! CLI command handlers
//!
//! This module contains all the command handlers for the fusionrag CLI

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::cli::output::*;
use crate::llm::LlmClient;
use crate::llm::TextGenerator;
use crate::models::Metadata;
use crate::models::RankedList;
use crate::rag::fuse;
use crate::rag::QueryExpander;
use crate::rag::RagQuery;
use crate::rag::RagService;
use crate::AppConfig;
use crate::Result;

/// Handle fuse command: offline RRF over ranked lists read from JSON
pub fn handle_fuse(
    config: &AppConfig,
    file: &Path,
    k: Option<f64>,
    top_k: Option<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let lists: Vec<RankedList> = serde_json::from_str(&content)?;
    let k = k.unwrap_or_else(|| config.fusion_k());

    let mut fused = fuse(&lists, k)?;
    if let Some(top_k) = top_k {
        fused.truncate(top_k);
    }
    info!("Fused {} lists (k = {}) into {} documents", lists.len(), k, fused.len());

    println!("{}", serde_json::to_string_pretty(&fused)?);
    Ok(())
}

/// Handle expand command
pub async fn handle_expand(config: &AppConfig, query: &str, num_queries: usize) -> Result<()> {
    let expander = match LlmClient::from_app_config(config) {
        Ok(client) => {
            let generator: Arc<dyn TextGenerator> = Arc::new(client);
            QueryExpander::new(generator)
                .with_temperature(config.llm.temperature)
                .with_max_tokens(config.llm.max_tokens)
        }
        Err(e) => {
            print_warning(&format!("LLM unavailable ({e}), using heuristic expansion"));
            QueryExpander::heuristic()
        }
    };

    let queries = expander.expand(query, num_queries).await;
    print_queries(query, &queries);
    Ok(())
}

/// Handle ingest command: one document per non-empty line
pub async fn handle_ingest(config: &AppConfig, file: &Path, force: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let source = file.display().to_string();

    let mut texts = Vec::new();
    let mut metadatas = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        texts.push(text.to_string());
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!(source));
        metadata.insert("line".to_string(), json!(line_no + 1));
        metadatas.push(metadata);
    }

    if texts.is_empty() {
        print_warning(&format!("No documents found in {source}"));
        return Ok(());
    }

    print_info(&format!("Ingesting {} documents from {source}", texts.len()));
    let service = RagService::new(config)?;
    let ids = service.add_documents(&texts, Some(metadatas), force).await?;
    print_success(&format!(
        "Added {} documents to collection '{}'",
        ids.len(),
        config.collection()
    ));
    Ok(())
}

/// Handle query command
pub async fn handle_query(
    config: &AppConfig,
    question: &str,
    basic: bool,
    rerank: bool,
    fields: Vec<String>,
    as_json: bool,
) -> Result<()> {
    let service = RagService::new(config)?;

    let mut query = RagQuery::new(question).with_fields(fields);
    if basic {
        query = query.basic(rerank);
    }

    let response = service.query_with_options(query).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.format());
    }
    Ok(())
}

/// Handle clean command
pub async fn handle_clean(config: &AppConfig) -> Result<()> {
    let service = RagService::new(config)?;
    if service.clear().await? {
        print_success(&format!("Deleted collection '{}'", config.collection()));
    } else {
        print_info(&format!("Collection '{}' does not exist", config.collection()));
    }
    Ok(())
}

/// Handle check command: resolve the LLM provider without printing the credential
pub fn handle_check(config: &AppConfig) -> Result<()> {
    config.validate()?;
    print_success("Configuration is valid");

    match config.llm.resolve() {
        Ok(resolved) => {
            print_llm_check(&resolved);
            Ok(())
        }
        Err(e) => {
            print_error(&format!("LLM configuration incomplete: {e}"));
            print_info(&format!(
                "Set llm.api_key or the {} environment variable",
                config.llm.provider.credential_env()
            ));
            Err(e)
        }
    }
}

/// Handle config command
pub fn handle_config(config: &AppConfig) -> Result<()> {
    print_config(config);
    Ok(())
}
