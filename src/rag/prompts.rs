//! Prompt templates for query expansion, answering and extraction

/// Answer used when the context holds nothing relevant
pub const NO_ANSWER: &str = "Based on the provided information, I cannot answer this question.";

/// Build multi-query expansion prompt
pub fn build_expansion_prompt(original_query: &str, count: usize) -> String {
    format!(
        r"Based on the following question, generate {count} different questions that:
1. Ask for the same or related information from different angles
2. Use different wording
3. Cover different aspects of the question

Original question: {original_query}

Return only the questions, one per line, without numbering:"
    )
}

/// Build answer generation prompt over an assembled context
pub fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"Answer the question based on the context below. If the context does not contain relevant information, say "{NO_ANSWER}"

Context:
{context}

Question: {question}

Answer:"#
    )
}

/// Build structured extraction prompt
pub fn build_extraction_prompt(text: &str, fields: &[String]) -> String {
    let field_list = fields
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r"Extract the following fields from the text and return them as a single JSON object.
Use exactly these keys; use null when a field is not mentioned.

Fields:
{field_list}

Text:
{text}

JSON:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_prompt_mentions_count_and_query() {
        let prompt = build_expansion_prompt("What is RRF?", 4);
        assert!(prompt.contains("generate 4 different questions"));
        assert!(prompt.contains("Original question: What is RRF?"));
    }

    #[test]
    fn test_answer_prompt_layout() {
        let prompt = build_answer_prompt("Q?", "Document 1: text");
        assert!(prompt.contains("Context:\nDocument 1: text"));
        assert!(prompt.contains("Question: Q?"));
        assert!(prompt.ends_with("Answer:"));
        assert!(prompt.contains(NO_ANSWER));
    }

    #[test]
    fn test_extraction_prompt_lists_fields() {
        let prompt = build_extraction_prompt("body", &["title".to_string(), "year".to_string()]);
        assert!(prompt.contains("- title\n- year"));
        assert!(prompt.contains("Text:\nbody"));
    }
}
