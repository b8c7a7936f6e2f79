//! The completion orchestrator.
//!
//! One request flows through
//! `Received → Retrieving → Prompting → Streaming → {Completed, Failed}`:
//!
//! 1. **Receive** the question, trimmed; blank input is rejected
//! 2. **Retrieve** knowledge for it (never fails, may yield sentinel text)
//! 3. **Prompt**: fill the user template and append it to a snapshot of the
//!    session history, for the model only
//! 4. **Stream** the completion, relaying reasoning and answer fragments
//! 5. **Complete**: record the original question and full answer in the
//!    session, hand the exchange to the memory writer, emit `complete`
//!
//! History is only written on completion, so a failed stream leaves the
//! session untouched.

use std::sync::Arc;

use policybot_config::AppConfig;
use policybot_core::error::{ChatError, ProviderError};
use policybot_core::memory::MemoryService;
use policybot_core::message::{Message, SessionId};
use policybot_core::provider::{Provider, ProviderRequest, ThinkingMode};
use policybot_core::retrieval::Retriever;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::context::{
    PROFILE_UNAVAILABLE, PromptTemplates, TemplateError, extract_profile, format_profile,
};
use crate::memory_writer::{MemoryWriteHandle, MemoryWriter};
use crate::session::SessionStore;
use crate::stream_event::ChatStreamEvent;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Retrieving,
    Prompting,
    Streaming,
    Completed,
    Failed,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Retrieving => "retrieving",
            Self::Prompting => "prompting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Startup failures when assembling an orchestrator from configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Drives retrieval, prompting, streaming and bookkeeping for chat requests.
pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    retriever: Arc<dyn Retriever>,
    writer: Arc<MemoryWriter>,
    templates: PromptTemplates,
    sessions: Arc<SessionStore>,
    model: String,
    thinking: ThinkingMode,
    pending_writes: Arc<Mutex<Vec<MemoryWriteHandle>>>,
}

impl ChatOrchestrator {
    /// Create an orchestrator whose sessions start with `system_message`.
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
        memory: Arc<dyn MemoryService>,
        templates: PromptTemplates,
        system_message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            retriever,
            writer: Arc::new(MemoryWriter::new(memory)),
            templates,
            sessions: Arc::new(SessionStore::new(system_message)),
            model: policybot_config::LlmConfig::default().model,
            thinking: ThinkingMode::default(),
            pending_writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the model / endpoint identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the reasoning mode sent with every request.
    pub fn with_thinking(mut self, thinking: ThinkingMode) -> Self {
        self.thinking = thinking;
        self
    }

    /// Assemble everything from configuration: provider, retriever, memory,
    /// templates, and the profile-bearing system message.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        let provider = policybot_providers::build_from_config(&config.llm)?;
        let retriever = policybot_retrieval::build_from_config(&config.retrieval);
        let memory = policybot_memory::build_from_config(&config.memory);
        let templates = PromptTemplates::load(&config.templates)?;

        let system_message = build_system_message(memory.as_ref(), &templates).await;

        info!(
            provider = provider.name(),
            retriever = retriever.name(),
            memory = memory.name(),
            model = %config.llm.model,
            "Chat orchestrator ready"
        );

        Ok(Self::new(provider, retriever, memory, templates, system_message)
            .with_model(config.llm.model.clone())
            .with_thinking(config.llm.thinking))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn memory_writer(&self) -> &MemoryWriter {
        &self.writer
    }

    /// Wait for every memory write submitted so far.
    pub async fn flush_memory(&self) {
        let handles: Vec<MemoryWriteHandle> = self.pending_writes.lock().await.drain(..).collect();
        for handle in handles {
            // Outcomes are already logged by the writer task
            let _ = handle.outcome().await;
        }
    }

    /// Answer `raw_message` in `session_id`, streaming events as they arrive.
    ///
    /// Errors returned here happen before any event is produced; once the
    /// receiver is handed back, failures arrive as an `error` event.
    pub async fn run_stream(
        &self,
        session_id: SessionId,
        raw_message: &str,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>, ChatError> {
        let trace_phase =
            |phase: RequestPhase| debug!(session = %session_id, %phase, "Chat request");

        trace_phase(RequestPhase::Received);
        let user_input = raw_message.trim().to_string();
        if user_input.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        trace_phase(RequestPhase::Retrieving);
        let knowledge = self.retriever.retrieve(&user_input).await;

        trace_phase(RequestPhase::Prompting);
        let filled_prompt = self.templates.user_prompt(&knowledge, &user_input);
        let mut messages = self.sessions.snapshot(&session_id).await;
        messages.push(Message::user(filled_prompt));

        trace_phase(RequestPhase::Streaming);
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            thinking: self.thinking,
        };
        let mut chunks = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => {
                trace_phase(RequestPhase::Failed);
                warn!(session = %session_id, error = %e, "Failed to open completion stream");
                return Err(e.into());
            }
        };

        let (tx, rx) = mpsc::channel::<ChatStreamEvent>(128);
        let sessions = self.sessions.clone();
        let writer = self.writer.clone();
        let pending_writes = self.pending_writes.clone();

        tokio::spawn(async move {
            let mut reasoning_started = false;
            let mut answer_started = false;
            let mut answer = String::new();

            while let Some(item) = chunks.recv().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(
                            session = %session_id,
                            phase = %RequestPhase::Failed,
                            "Chat request"
                        );
                        warn!(session = %session_id, error = %e, "Completion stream failed");
                        let _ = tx.send(ChatStreamEvent::Error { content: e.to_string() }).await;
                        return;
                    }
                };

                let mut events = Vec::with_capacity(2);
                if let Some(reasoning) = chunk.reasoning.filter(|r| !r.is_empty()) {
                    if !reasoning_started {
                        reasoning_started = true;
                        events.push(ChatStreamEvent::ReasoningStart);
                    }
                    events.push(ChatStreamEvent::Reasoning { content: reasoning });
                } else if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                    if !answer_started {
                        answer_started = true;
                        events.push(ChatStreamEvent::AnswerStart);
                    }
                    answer.push_str(&content);
                    events.push(ChatStreamEvent::Answer { content });
                }

                for event in events {
                    if tx.send(event).await.is_err() {
                        debug!(session = %session_id, "Client disconnected, stopping relay");
                        return;
                    }
                }

                if chunk.done {
                    break;
                }
            }

            sessions.append_exchange(&session_id, &user_input, &answer).await;

            let turn = vec![Message::user(&user_input), Message::assistant(&answer)];
            let handle = writer.submit(turn);
            {
                let mut pending = pending_writes.lock().await;
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }

            debug!(
                session = %session_id,
                phase = %RequestPhase::Completed,
                answer_len = answer.len(),
                "Chat request"
            );
            let _ = tx.send(ChatStreamEvent::Complete).await;
        });

        Ok(rx)
    }
}

/// Fetch the profile and render the system message.
///
/// A failed fetch is logged and rendered as an "unavailable" note.
pub async fn build_system_message(
    memory: &dyn MemoryService,
    templates: &PromptTemplates,
) -> String {
    let profile_text = match memory.fetch_profile().await {
        Ok(document) => {
            let profile = extract_profile(&document);
            debug!(entries = profile.len(), "User profile extracted");
            format_profile(&profile)
        }
        Err(e) => {
            warn!(backend = memory.name(), error = %e, "Failed to fetch user profile");
            PROFILE_UNAVAILABLE.to_string()
        }
    };
    templates.system_message(&profile_text)
}
