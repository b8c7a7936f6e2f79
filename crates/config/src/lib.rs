//! Configuration loading, validation, and management for policybot.
//!
//! Loads configuration from `policybot.toml` (or the path given by
//! `--config` / `POLICYBOT_CONFIG`) with environment variable overrides.
//! Validates all settings at startup.

use policybot_core::provider::ThinkingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "policybot.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion endpoint settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Long-term memory service settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// RAG retrieval service settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Prompt template files
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

// --- LLM ---

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name used in logs and diagnostics
    #[serde(default = "default_llm_name")]
    pub name: String,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model / inference endpoint identifier
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub thinking: ThinkingMode,

    /// Client-side ceiling for a whole completion call. Reasoning models
    /// can think for a long time.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_name() -> String {
    "ark".into()
}
fn default_llm_base_url() -> String {
    "https://ark.cn-beijing.volces.com/api/v3".into()
}
fn default_model() -> String {
    "ep-20250724160144-rtzxn".into()
}
fn default_llm_timeout() -> u64 {
    1800
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            name: default_llm_name(),
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            thinking: ThinkingMode::default(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("thinking", &self.thinking)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// --- Memory ---

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "memobase", "in_memory" or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    #[serde(default = "default_project_url")]
    pub project_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// The single user whose profile and memory the assistant uses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Profile topics fetched at startup
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Max sub-topics per topic
    #[serde(default = "default_max_subtopic_size")]
    pub max_subtopic_size: u32,
}

fn default_memory_backend() -> String {
    "memobase".into()
}
fn default_project_url() -> String {
    "https://api.memobase.dev".into()
}
fn default_topics() -> Vec<String> {
    vec!["interest".into(), "basic_info".into(), "life_event".into()]
}
fn default_max_subtopic_size() -> u32 {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            project_url: default_project_url(),
            api_key: None,
            user_id: None,
            topics: default_topics(),
            max_subtopic_size: default_max_subtopic_size(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("project_url", &self.project_url)
            .field("api_key", &redact(&self.api_key))
            .field("user_id", &self.user_id)
            .field("topics", &self.topics)
            .field("max_subtopic_size", &self.max_subtopic_size)
            .finish()
    }
}

// --- Retrieval ---

/// Query mode forwarded to the RAG service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Naive,
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Hybrid => "hybrid",
        }
    }
}

/// How the RAG response body is turned into prompt context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextExtraction {
    /// Whole body as pretty JSON
    #[default]
    Passthrough,
    /// Only the fenced "Document Chunks" block inside `response`
    DocumentChunks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub mode: RetrievalMode,

    #[serde(default)]
    pub extraction: ContextExtraction,

    /// Retrieval depth, overridable by `CHUNK_TOP_K`
    #[serde(default = "default_chunk_top_k")]
    pub chunk_top_k: u32,
}

fn default_retrieval_endpoint() -> String {
    "http://localhost:9621/query".into()
}
fn default_chunk_top_k() -> u32 {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_retrieval_endpoint(),
            mode: RetrievalMode::default(),
            extraction: ContextExtraction::default(),
            chunk_top_k: default_chunk_top_k(),
        }
    }
}

// --- Templates ---

/// What to do when a template file cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTemplatePolicy {
    /// Use the built-in templates
    #[default]
    Fallback,
    /// Refuse to start
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_system_template")]
    pub system_path: PathBuf,

    #[serde(default = "default_user_template")]
    pub user_path: PathBuf,

    #[serde(default)]
    pub on_missing: MissingTemplatePolicy,
}

fn default_system_template() -> PathBuf {
    PathBuf::from("system_prompt.txt")
}
fn default_user_template() -> PathBuf {
    PathBuf::from("prompt.txt")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            system_path: default_system_template(),
            user_path: default_user_template(),
            on_missing: MissingTemplatePolicy::default(),
        }
    }
}

// --- Gateway ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Reported by `GET /health`
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// CORS origins; `["*"]` allows any
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_service_name() -> String {
    "政策问答助手API".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            service_name: default_service_name(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Path resolution: explicit `path`, then `POLICYBOT_CONFIG`, then
    /// `./policybot.toml`. Environment variables override file values:
    /// - `ARK_API_KEY`, `POLICYBOT_MODEL`
    /// - `CHUNK_TOP_K`
    /// - `MEMOBASE_PROJECT_URL`, `MEMOBASE_API_KEY`, `MEMOBASE_USER_ID`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("POLICYBOT_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Secrets only fill in when the file left them unset; tuning values
    /// (`CHUNK_TOP_K`, `POLICYBOT_MODEL`) always win.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("ARK_API_KEY");
        }

        if let Some(model) = lookup("POLICYBOT_MODEL") {
            self.llm.model = model;
        }

        if let Some(raw) = lookup("CHUNK_TOP_K") {
            self.retrieval.chunk_top_k =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "CHUNK_TOP_K",
                    reason: format!("expected a positive integer, got {raw:?}"),
                })?;
        }

        if let Some(url) = lookup("MEMOBASE_PROJECT_URL") {
            self.memory.project_url = url;
        }
        if self.memory.api_key.is_none() {
            self.memory.api_key = lookup("MEMOBASE_API_KEY");
        }
        if self.memory.user_id.is_none() {
            self.memory.user_id = lookup("MEMOBASE_USER_ID");
        }

        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.chunk_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_top_k must be > 0".into(),
            ));
        }

        if self.memory.max_subtopic_size == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_subtopic_size must be > 0".into(),
            ));
        }

        if self.memory.topics.is_empty() {
            return Err(ConfigError::ValidationError(
                "memory.topics must name at least one topic".into(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value in {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
