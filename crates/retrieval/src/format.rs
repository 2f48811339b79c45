//! Rendering search hits into the context block sent to the LLM.

use ragchat_core::retriever::SearchHit;

/// Context used when nothing relevant was retrieved.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the documents.";

/// Render hits as `[Source: <source>] <text>` blocks separated by blank lines.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RELEVANT_INFORMATION.to_string();
    }

    hits.iter()
        .map(|hit| format!("[Source: {}] {}", hit.source(), hit.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
