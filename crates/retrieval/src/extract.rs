//! Turning a LightRAG response body into prompt context.

use policybot_config::ContextExtraction;
use regex_lite::Regex;
use serde_json::Value;

/// Fenced JSON block that LightRAG appends under its "Document Chunks" header.
const DOCUMENT_CHUNKS_PATTERN: &str = r"(?s)-----Document Chunks\(DC\)-----\s*\n\s*```json\s*(.*?)\s*```";

/// Render a parsed response body according to `mode`.
pub fn extract_context(body: &Value, mode: ContextExtraction) -> String {
    match mode {
        ContextExtraction::Passthrough => pretty(body),
        ContextExtraction::DocumentChunks => body
            .get("response")
            .and_then(Value::as_str)
            .and_then(extract_document_chunks)
            .unwrap_or_else(|| pretty(body)),
    }
}

/// Pull the Document Chunks block out of a LightRAG `response` string.
///
/// A block that parses as JSON is re-rendered pretty; otherwise the raw
/// captured text is returned. `None` when there is no such block.
pub fn extract_document_chunks(response: &str) -> Option<String> {
    let re = Regex::new(DOCUMENT_CHUNKS_PATTERN).ok()?;
    let block = re.captures(response)?.get(1)?.as_str();

    match serde_json::from_str::<Value>(block) {
        Ok(chunks) => Some(pretty(&chunks)),
        Err(e) => {
            tracing::warn!(error = %e, "Document Chunks block is not valid JSON, using raw text");
            Some(block.to_string())
        }
    }
}

/// Two-space indented JSON with non-ASCII text kept as-is.
fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
