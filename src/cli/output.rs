//! CLI output formatting utilities
//!
//! This module provides consistent output formatting for the `fusionrag` CLI

use crate::config::ResolvedLlmConfig;
use crate::AppConfig;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// Returns the original string when it fits, otherwise the first
/// `max_chars` characters followed by "...".
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Print expanded queries
pub fn print_queries(original: &str, queries: &[String]) {
    println!("🔎 Expanded \"{original}\" into {} queries:", queries.len());
    for (idx, query) in queries.iter().enumerate() {
        println!("  {}. {}", idx + 1, query);
    }
}

/// Print configuration with credentials masked
pub fn print_config(config: &AppConfig) {
    println!("📋 fusionrag Configuration:");
    println!();
    match config.to_masked_toml() {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => print_error(&format!("Failed to render configuration: {e}")),
    }
}

/// Print the outcome of a configuration check
pub fn print_llm_check(resolved: &ResolvedLlmConfig) {
    println!("🤖 LLM:");
    println!("  Provider: {}", resolved.provider);
    println!("  Model: {}", resolved.model);
    println!("  Base URL: {}", resolved.base_url);
    println!("  Key: {}", resolved.masked_api_key());
    println!("  Timeout: {}s", resolved.timeout.as_secs());
}

/// Print colored output functions
pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}
