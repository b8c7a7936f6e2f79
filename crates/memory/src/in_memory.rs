//! In-memory backend — useful for testing and offline runs.

use async_trait::async_trait;
use policybot_core::error::MemoryError;
use policybot_core::memory::MemoryService;
use policybot_core::message::Message;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Serves a fixed profile document and records every inserted turn.
pub struct InMemoryMemory {
    profile: serde_json::Value,
    turns: Arc<RwLock<Vec<Vec<Message>>>>,
    fail_writes: bool,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::with_profile(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn with_profile(profile: serde_json::Value) -> Self {
        Self {
            profile,
            turns: Arc::new(RwLock::new(Vec::new())),
            fail_writes: false,
        }
    }

    /// Make every `insert_turn` fail, for exercising error paths.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Turns recorded so far, oldest first.
    pub async fn turns(&self) -> Vec<Vec<Message>> {
        self.turns.read().await.clone()
    }
}

impl Default for InMemoryMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryService for InMemoryMemory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn ping(&self) -> Result<bool, MemoryError> {
        Ok(true)
    }

    async fn fetch_profile(&self) -> Result<serde_json::Value, MemoryError> {
        Ok(self.profile.clone())
    }

    async fn insert_turn(&self, messages: &[Message]) -> Result<(), MemoryError> {
        if self.fail_writes {
            return Err(MemoryError::Request("write rejected".into()));
        }
        self.turns.write().await.push(messages.to_vec());
        Ok(())
    }
}
