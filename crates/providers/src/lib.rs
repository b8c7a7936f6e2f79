//! LLM provider implementations for policybot.
//!
//! All providers implement the `policybot_core::Provider` trait. Only the
//! OpenAI-compatible streaming client is needed: Ark and most hosted
//! reasoning models speak that protocol.

pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use policybot_config::LlmConfig;
use policybot_core::error::ProviderError;
use policybot_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// Fails with `NotConfigured` when no API key is available.
pub fn build_from_config(config: &LlmConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "No API key. Set ARK_API_KEY or [llm].api_key in policybot.toml".into(),
        )
    })?;

    let provider = OpenAiCompatProvider::new(
        config.name.clone(),
        config.base_url.clone(),
        api_key,
        Duration::from_secs(config.timeout_secs),
    )?;

    tracing::debug!(
        provider = %config.name,
        base_url = %config.base_url,
        timeout_secs = config.timeout_secs,
        "Provider configured"
    );

    Ok(Arc::new(provider))
}
