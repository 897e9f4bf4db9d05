//! Text generation module
//!
//! [`TextGenerator`] is the seam the RAG pipeline talks to; [`LlmClient`]
//! implements it for OpenAI-compatible chat completion APIs (OpenAI, Doubao,
//! Qwen, Zhipu) and for ERNIE's own endpoint.

pub mod client;
pub mod structured;

use async_trait::async_trait;
pub use client::ChatMessage;
pub use client::LlmClient;
pub use structured::StructuredExtractor;

use crate::errors::Result;

/// A text-completion backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt`, returning the generated text
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String>;
}
