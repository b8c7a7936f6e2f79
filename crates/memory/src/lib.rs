//! Long-term memory implementations for policybot.
//!
//! `build_from_config` picks the backend named by `memory.backend`. A
//! Memobase backend without credentials degrades to [`NoopMemory`].

pub mod in_memory;
pub mod memobase;
pub mod noop;

use std::sync::Arc;

use policybot_config::MemoryConfig;
use policybot_core::memory::MemoryService;

pub use in_memory::InMemoryMemory;
pub use memobase::{MemobaseClient, MemobaseSettings};
pub use noop::NoopMemory;

/// Build the configured memory backend.
pub fn build_from_config(config: &MemoryConfig) -> Arc<dyn MemoryService> {
    match config.backend.as_str() {
        "memobase" => match memobase_settings(config) {
            Some(settings) => {
                tracing::info!(user_id = %settings.user_id, "Using Memobase memory");
                Arc::new(MemobaseClient::new(settings))
            }
            None => {
                tracing::warn!(
                    "Memobase credentials missing (MEMOBASE_API_KEY / MEMOBASE_USER_ID), memory disabled"
                );
                Arc::new(NoopMemory)
            }
        },
        "in_memory" => Arc::new(InMemoryMemory::new()),
        "none" => Arc::new(NoopMemory),
        other => {
            tracing::warn!(backend = %other, "Unknown memory backend, memory disabled");
            Arc::new(NoopMemory)
        }
    }
}

fn memobase_settings(config: &MemoryConfig) -> Option<MemobaseSettings> {
    let api_key = config.api_key.clone().filter(|k| !k.is_empty())?;
    let user_id = config.user_id.clone().filter(|u| !u.is_empty())?;
    Some(MemobaseSettings {
        project_url: config.project_url.clone(),
        api_key,
        user_id,
        topics: config.topics.clone(),
        max_subtopic_size: config.max_subtopic_size,
    })
}
