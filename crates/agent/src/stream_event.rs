//! Chat streaming events.
//!
//! `ChatStreamEvent` is what the orchestrator emits while relaying a
//! completion. The gateway writes each one as a line of NDJSON.

use serde::{Deserialize, Serialize};

/// Events emitted during a streamed answer.
///
/// Wire format (`type` tag, snake_case):
/// - `reasoning_start` — first reasoning fragment is about to follow
/// - `reasoning`       — chain-of-thought fragment
/// - `answer_start`    — first answer fragment is about to follow
/// - `answer`          — answer fragment
/// - `complete`        — the answer is finished and recorded
/// - `error`           — the stream failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    ReasoningStart,
    Reasoning { content: String },
    AnswerStart,
    Answer { content: String },
    Complete,
    Error { content: String },
}

impl ChatStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReasoningStart => "reasoning_start",
            Self::Reasoning { .. } => "reasoning",
            Self::AnswerStart => "answer_start",
            Self::Answer { .. } => "answer",
            Self::Complete => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// One NDJSON line, newline included.
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","content":"event serialization failed: {e}"}}"#)
        });
        line.push('\n');
        line
    }
}
