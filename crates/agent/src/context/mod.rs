//! Prompt context: the user profile block and the prompt templates.
//!
//! The system message is built once at startup from the profile; the user
//! prompt is rebuilt per request from retrieved knowledge and the question.

pub mod profile;
pub mod template;

pub use profile::{
    EMPTY_PROFILE, ExtractedProfile, PROFILE_UNAVAILABLE, ProfileNode, clean_content,
    extract_profile, format_profile,
};
pub use template::{PromptTemplates, TemplateError, fill};
