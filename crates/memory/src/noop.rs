//! No-op memory backend — disables long-term memory entirely.

use async_trait::async_trait;
use policybot_core::error::MemoryError;
use policybot_core::memory::MemoryService;
use policybot_core::message::Message;

/// A no-op memory backend: empty profile, writes are discarded.
pub struct NoopMemory;

#[async_trait]
impl MemoryService for NoopMemory {
    fn name(&self) -> &str {
        "none"
    }

    async fn ping(&self) -> Result<bool, MemoryError> {
        Ok(true)
    }

    async fn fetch_profile(&self) -> Result<serde_json::Value, MemoryError> {
        Ok(serde_json::Value::Object(serde_json::Map::new()))
    }

    async fn insert_turn(&self, _messages: &[Message]) -> Result<(), MemoryError> {
        Ok(())
    }
}
