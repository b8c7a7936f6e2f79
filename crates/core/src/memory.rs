//! Memory trait — the long-term user memory / profile store.
//!
//! The assistant reads a structured profile of the user once at startup and
//! writes every completed exchange back so the store can refine that profile.
//! The store itself (storage, eviction, profile extraction) is external.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::Message;

/// The core MemoryService trait.
///
/// Implementations: Memobase (REST), in-memory (for testing), none (no-op).
/// Every implementation is bound to a single user identifier.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// The backend name (e.g., "memobase", "none").
    fn name(&self) -> &str;

    /// Can we reach the service?
    async fn ping(&self) -> Result<bool, MemoryError>;

    /// Fetch the user's profile as a nested JSON document.
    ///
    /// Leaves are objects carrying both `id` and `content`; everything else
    /// is grouping.
    async fn fetch_profile(&self) -> Result<serde_json::Value, MemoryError>;

    /// Append one exchange to the user's memory and flush it synchronously.
    async fn insert_turn(&self, messages: &[Message]) -> Result<(), MemoryError>;
}
