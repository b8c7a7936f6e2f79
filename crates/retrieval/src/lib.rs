//! Knowledge retrieval for policybot.
//!
//! The retriever asks a LightRAG server for context relevant to the user's
//! question and renders it as text for the prompt. It never fails: service
//! problems come back as sentinel strings the model reads in place of
//! context.

pub mod extract;
pub mod lightrag;

use std::sync::Arc;

use policybot_config::RetrievalConfig;
use policybot_core::retrieval::Retriever;

pub use extract::{extract_context, extract_document_chunks};
pub use lightrag::LightRagRetriever;

/// Returned when the service is unreachable or answers with a non-2xx status.
pub const CONNECTION_FAILED: &str = "无法连接到知识库。";

/// Returned when the service answers with a body that is not JSON.
pub const INVALID_FORMAT: &str = "知识库返回了无效的格式。";

/// Build the configured retriever.
pub fn build_from_config(config: &RetrievalConfig) -> Arc<dyn Retriever> {
    tracing::debug!(
        endpoint = %config.endpoint,
        mode = config.mode.as_str(),
        extraction = ?config.extraction,
        chunk_top_k = config.chunk_top_k,
        "Retriever configured"
    );
    Arc::new(LightRagRetriever::from_config(config))
}
