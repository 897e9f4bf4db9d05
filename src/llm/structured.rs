//! Structured field extraction from free text

use std::sync::Arc;

use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::llm::TextGenerator;
use crate::rag::prompts::build_extraction_prompt;

const EXTRACTION_TEMPERATURE: f32 = 0.0;
const EXTRACTION_MAX_TOKENS: u32 = 500;

/// Asks the LLM for a JSON object with a fixed set of fields
pub struct StructuredExtractor {
    generator: Arc<dyn TextGenerator>,
}

impl StructuredExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Extract `fields` from `text`
    ///
    /// Never fails: an unparsable response comes back as `{"raw_output": ...}`
    /// and a generator failure as `{"error": ...}`.
    pub async fn extract(&self, text: &str, fields: &[String]) -> Value {
        if fields.is_empty() {
            return json!({});
        }

        let prompt = build_extraction_prompt(text, fields);
        match self
            .generator
            .generate(&prompt, EXTRACTION_TEMPERATURE, EXTRACTION_MAX_TOKENS)
            .await
        {
            Ok(response) => parse_json_response(&response),
            Err(e) => {
                warn!("Structured extraction failed: {}", e);
                json!({ "error": e.to_string() })
            }
        }
    }
}

/// Parse a JSON object from a model response, tolerating code fences and prose around it
fn parse_json_response(response: &str) -> Value {
    let trimmed = strip_code_fence(response.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    // Fall back to the outermost braces
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&trimmed[start..=end])
            {
                return value;
            }
        }
    }

    debug!("Response is not a JSON object, returning raw output");
    json!({ "raw_output": response })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
