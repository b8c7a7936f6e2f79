//! LightRAG `/query` client.

use async_trait::async_trait;
use policybot_config::{ContextExtraction, RetrievalConfig, RetrievalMode};
use policybot_core::retrieval::Retriever;
use serde::Serialize;
use tracing::{debug, warn};

use crate::extract::extract_context;
use crate::{CONNECTION_FAILED, INVALID_FORMAT};

/// Queries a LightRAG server in context-only mode.
pub struct LightRagRetriever {
    endpoint: String,
    mode: RetrievalMode,
    extraction: ContextExtraction,
    chunk_top_k: u32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    mode: &'static str,
    only_need_context: bool,
    chunk_top_k: u32,
}

impl LightRagRetriever {
    pub fn new(
        endpoint: impl Into<String>,
        mode: RetrievalMode,
        extraction: ContextExtraction,
        chunk_top_k: u32,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            mode,
            extraction,
            chunk_top_k,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.mode,
            config.extraction,
            config.chunk_top_k,
        )
    }
}

#[async_trait]
impl Retriever for LightRagRetriever {
    fn name(&self) -> &str {
        "lightrag"
    }

    async fn retrieve(&self, query: &str) -> String {
        let request = QueryRequest {
            query,
            mode: self.mode.as_str(),
            only_need_context: true,
            chunk_top_k: self.chunk_top_k,
        };

        debug!(
            endpoint = %self.endpoint,
            mode = request.mode,
            chunk_top_k = self.chunk_top_k,
            "Querying knowledge base"
        );

        let response = match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Knowledge base unreachable");
                return CONNECTION_FAILED.to_string();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Knowledge base returned error status"
            );
            return CONNECTION_FAILED.to_string();
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Knowledge base response interrupted");
                return CONNECTION_FAILED.to_string();
            }
        };

        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(body) => extract_context(&body, self.extraction),
            Err(e) => {
                warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    "Knowledge base returned invalid JSON"
                );
                INVALID_FORMAT.to_string()
            }
        }
    }
}
