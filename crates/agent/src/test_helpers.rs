//! Shared test doubles for orchestrator tests.

use std::sync::Mutex;

use async_trait::async_trait;
use policybot_core::error::{MemoryError, ProviderError};
use policybot_core::memory::MemoryService;
use policybot_core::message::Message;
use policybot_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use policybot_core::retrieval::Retriever;
use tokio::sync::mpsc;

use crate::stream_event::ChatStreamEvent;

/// A provider that replays the same scripted chunks on every call and
/// records the requests it receives.
pub struct ScriptedProvider {
    script: Vec<Result<StreamChunk, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(self.script.len().max(1));
        for item in self.script.iter().cloned() {
            tx.send(item).await.unwrap();
        }
        Ok(rx)
    }
}

/// Upstream half of a [`ChannelProvider`] stream.
pub type ChunkSender = mpsc::Sender<Result<StreamChunk, ProviderError>>;

/// A provider whose stream the test feeds by hand.
pub struct ChannelProvider {
    sender: Mutex<Option<ChunkSender>>,
}

impl ChannelProvider {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// The sending half of the most recently opened stream.
    pub fn take_sender(&self) -> Option<ChunkSender> {
        self.sender.lock().unwrap().take()
    }
}

#[async_trait]
impl Provider for ChannelProvider {
    fn name(&self) -> &str {
        "channel_mock"
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (tx, rx) = mpsc::channel(8);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

/// A provider whose stream can never be opened.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        Err(ProviderError::AuthenticationFailed("bad key".into()))
    }
}

/// A retriever that always returns the same text.
pub struct FixedRetriever {
    text: String,
}

impl FixedRetriever {
    pub fn new(text: &str) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn retrieve(&self, _query: &str) -> String {
        self.text.clone()
    }
}

/// A memory service that is always down.
pub struct FailingMemory;

#[async_trait]
impl MemoryService for FailingMemory {
    fn name(&self) -> &str {
        "failing"
    }

    async fn ping(&self) -> Result<bool, MemoryError> {
        Err(MemoryError::Request("unreachable".into()))
    }

    async fn fetch_profile(&self) -> Result<serde_json::Value, MemoryError> {
        Err(MemoryError::Request("unreachable".into()))
    }

    async fn insert_turn(&self, _messages: &[Message]) -> Result<(), MemoryError> {
        Err(MemoryError::Request("unreachable".into()))
    }
}

pub async fn collect_events(mut rx: mpsc::Receiver<ChatStreamEvent>) -> Vec<ChatStreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
