//! Fire-and-forget memory writes.
//!
//! Each completed exchange is handed to the memory service on its own task
//! so the response stream never waits on it. Outcomes are logged here and
//! counted; callers that care (tests, shutdown) can await the handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use policybot_core::error::MemoryError;
use policybot_core::memory::MemoryService;
use policybot_core::message::Message;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Submits exchanges to the memory service in the background.
pub struct MemoryWriter {
    memory: Arc<dyn MemoryService>,
    stats: Arc<WriteStats>,
}

#[derive(Debug, Default)]
struct WriteStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Handle to one background write.
#[derive(Debug)]
pub struct MemoryWriteHandle {
    handle: JoinHandle<Result<(), MemoryError>>,
}

impl MemoryWriteHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the write to finish.
    pub async fn outcome(self) -> Result<(), MemoryError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(MemoryError::TaskAborted(e.to_string())),
        }
    }
}

impl MemoryWriter {
    pub fn new(memory: Arc<dyn MemoryService>) -> Self {
        Self {
            memory,
            stats: Arc::new(WriteStats::default()),
        }
    }

    /// Spawn a task that writes `turn` to the memory service.
    pub fn submit(&self, turn: Vec<Message>) -> MemoryWriteHandle {
        let memory = self.memory.clone();
        let stats = self.stats.clone();

        let handle = tokio::spawn(async move {
            let result = memory.insert_turn(&turn).await;
            match &result {
                Ok(()) => {
                    stats.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        backend = memory.name(),
                        messages = turn.len(),
                        "Memory write succeeded"
                    );
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(backend = memory.name(), error = %e, "Memory write failed");
                }
            }
            result
        });

        MemoryWriteHandle { handle }
    }

    pub fn succeeded(&self) -> u64 {
        self.stats.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}
