//! Prompt templates and placeholder filling.

use std::path::{Path, PathBuf};

use policybot_config::{MissingTemplatePolicy, TemplatesConfig};
use tracing::{info, warn};

pub const USER_PROFILE: &str = "{{USER_PROFILE}}";
pub const RAG_KNOWLEDGE_BASE: &str = "{{RAG_KNOWLEDGE_BASE}}";
pub const USER_QUESTION: &str = "{{USER_QUESTION}}";

const DEFAULT_SYSTEM_TEMPLATE: &str = "你是一个专业的政策问答助手，具有以下特点：
1. 基于用户画像：{{USER_PROFILE}}
2. 能够准确解答政策相关问题
3. 回答简洁明确，逻辑清晰
4. 当遇到不确定的问题时，会诚实地表示不知道

请根据用户的问题和提供的知识库内容，给出准确、有帮助的回答。";

const DEFAULT_USER_TEMPLATE: &str = "根据以下知识库内容回答用户问题：

知识库内容：
{{RAG_KNOWLEDGE_BASE}}

用户问题：{{USER_QUESTION}}

请基于知识库内容给出准确的回答，如果知识库中没有相关信息，请说明无法找到相关政策信息。";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("Failed to read template {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

/// The system and user prompt templates.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub system: String,
    pub user: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_TEMPLATE.to_string(),
            user: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Read both template files, applying the configured missing-file policy.
    ///
    /// With `fallback`, a missing or unreadable file replaces *both*
    /// templates with the built-in defaults.
    pub fn load(config: &TemplatesConfig) -> Result<Self, TemplateError> {
        let loaded = read(&config.system_path)
            .and_then(|system| Ok(Self { system, user: read(&config.user_path)? }));

        match (loaded, config.on_missing) {
            (Ok(templates), _) => {
                info!(
                    system = %config.system_path.display(),
                    user = %config.user_path.display(),
                    "Loaded prompt templates"
                );
                Ok(templates)
            }
            (Err(e), MissingTemplatePolicy::Fallback) => {
                warn!(error = %e, "Using built-in prompt templates");
                Ok(Self::default())
            }
            (Err(e), MissingTemplatePolicy::Abort) => Err(e),
        }
    }

    /// The system message with the profile block filled in.
    pub fn system_message(&self, profile: &str) -> String {
        fill(&self.system, &[(USER_PROFILE, profile)])
    }

    /// The per-request user prompt.
    pub fn user_prompt(&self, knowledge: &str, question: &str) -> String {
        fill(
            &self.user,
            &[(RAG_KNOWLEDGE_BASE, knowledge), (USER_QUESTION, question)],
        )
    }
}

fn read(path: &Path) -> Result<String, TemplateError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TemplateError::Missing {
            path: path.to_path_buf(),
        },
        _ => TemplateError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

/// Replace each placeholder with its value, in the given order.
///
/// Plain substring replacement: no escaping, and text introduced by an
/// earlier substitution is visible to later ones.
pub fn fill(template: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, value)
        })
}
