//! Per-session conversation histories.

use std::collections::HashMap;

use policybot_core::message::{Conversation, Message, SessionId};
use tokio::sync::RwLock;

/// Maximum number of live sessions before the least recently updated is evicted.
pub const MAX_SESSIONS: usize = 1_000;

/// Conversation histories keyed by session, each seeded with the same
/// system message.
pub struct SessionStore {
    system_message: String,
    capacity: usize,
    sessions: RwLock<HashMap<SessionId, Conversation>>,
}

impl SessionStore {
    pub fn new(system_message: impl Into<String>) -> Self {
        Self::with_capacity(system_message, MAX_SESSIONS)
    }

    pub fn with_capacity(system_message: impl Into<String>, capacity: usize) -> Self {
        Self {
            system_message: system_message.into(),
            capacity: capacity.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// A copy of the session's history. Unknown sessions yield just the
    /// system message and are not created.
    pub async fn snapshot(&self, id: &SessionId) -> Vec<Message> {
        match self.sessions.read().await.get(id) {
            Some(conv) => conv.messages().to_vec(),
            None => vec![Message::system(&self.system_message)],
        }
    }

    /// Append one completed exchange under a single write lock.
    pub async fn append_exchange(&self, id: &SessionId, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;

        if sessions.len() >= self.capacity && !sessions.contains_key(id) {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, c)| c.updated_at)
                .map(|(k, _)| k.clone())
            {
                tracing::debug!(session = %oldest, "Evicting session");
                sessions.remove(&oldest);
            }
        }

        sessions
            .entry(id.clone())
            .or_insert_with(|| Conversation::with_system(id.clone(), &self.system_message))
            .push_exchange(user, assistant);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
