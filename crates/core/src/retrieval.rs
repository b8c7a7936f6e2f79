//! Retriever trait — knowledge lookup for retrieval-augmented prompts.

use async_trait::async_trait;

/// Looks up knowledge relevant to a question and renders it as prompt text.
///
/// Retrieval never fails past this boundary: transport or format problems
/// are rendered as sentinel text that the model sees in place of context.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The retriever name (e.g., "lightrag").
    fn name(&self) -> &str;

    /// Return the context text for `query`.
    async fn retrieve(&self, query: &str) -> String;
}
