//! # policybot core
//!
//! Domain types, traits, and error definitions for the policy Q&A assistant.
//! This crate has **no framework dependencies**: it defines the model that the
//! collaborator crates (providers, memory, retrieval) implement against.
//!
//! Every external service the assistant stitches together is a trait here:
//! - [`Provider`] — streaming chat completion endpoint
//! - [`MemoryService`] — long-term user profile / memory store
//! - [`Retriever`] — RAG knowledge lookup

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{ChatError, MemoryError, ProviderError};
pub use memory::MemoryService;
pub use message::{Conversation, Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, StreamChunk, ThinkingMode};
pub use retrieval::Retriever;
