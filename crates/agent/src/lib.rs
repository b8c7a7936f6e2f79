//! Chat orchestration for policybot.
//!
//! Stitches the collaborators together for each question:
//!
//! 1. **Retrieve** knowledge for the question
//! 2. **Prompt** the model with the profile-bearing system message, the
//!    session history and the filled user template
//! 3. **Stream** reasoning and answer fragments back to the caller
//! 4. **Record** the exchange in the session and in long-term memory
//!
//! The system message is built once at startup from the user's profile.

pub mod context;
pub mod memory_writer;
pub mod orchestrator;
pub mod session;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ExtractedProfile, ProfileNode, PromptTemplates, TemplateError};
pub use memory_writer::{MemoryWriteHandle, MemoryWriter};
pub use orchestrator::{BuildError, ChatOrchestrator, RequestPhase, build_system_message};
pub use session::{MAX_SESSIONS, SessionStore};
pub use stream_event::ChatStreamEvent;
