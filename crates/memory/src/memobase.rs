//! Memobase REST backend.
//!
//! Memobase keeps a per-user structured profile that it refines from chat
//! blobs. Every response is wrapped as `{data, errno, errmsg}`; a non-zero
//! `errno` is a service-level failure even when the HTTP status is 200.

use async_trait::async_trait;
use policybot_core::error::MemoryError;
use policybot_core::memory::MemoryService;
use policybot_core::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Connection settings for one Memobase project and user.
#[derive(Clone)]
pub struct MemobaseSettings {
    pub project_url: String,
    pub api_key: String,
    pub user_id: String,
    pub topics: Vec<String>,
    pub max_subtopic_size: u32,
}

impl std::fmt::Debug for MemobaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemobaseSettings")
            .field("project_url", &self.project_url)
            .field("api_key", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("topics", &self.topics)
            .field("max_subtopic_size", &self.max_subtopic_size)
            .finish()
    }
}

/// A Memobase client bound to a single user.
pub struct MemobaseClient {
    api_base: String,
    settings: MemobaseSettings,
    client: reqwest::Client,
}

impl MemobaseClient {
    pub fn new(settings: MemobaseSettings) -> Self {
        let api_base = format!("{}/api/v1", settings.project_url.trim_end_matches('/'));
        Self {
            api_base,
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Look up the bound user. Fails when Memobase does not know them.
    pub async fn get_user(&self) -> Result<Value, MemoryError> {
        let url = format!("{}/users/{}", self.api_base, self.settings.user_id);
        self.call(self.client.get(&url)).await
    }

    /// Send a request and unwrap the `{data, errno, errmsg}` envelope.
    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, MemoryError> {
        let response = request
            .bearer_auth(&self.settings.api_key)
            .send()
            .await
            .map_err(|e| MemoryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Service {
                errno: i64::from(status.as_u16()),
                message: body,
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| MemoryError::InvalidResponse(e.to_string()))?;

        if envelope.errno != 0 {
            return Err(MemoryError::Service {
                errno: envelope.errno,
                message: envelope.errmsg,
            });
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl MemoryService for MemobaseClient {
    fn name(&self) -> &str {
        "memobase"
    }

    async fn ping(&self) -> Result<bool, MemoryError> {
        let url = format!("{}/healthcheck", self.api_base);
        self.call(self.client.get(&url)).await?;
        Ok(true)
    }

    async fn fetch_profile(&self) -> Result<Value, MemoryError> {
        let url = format!("{}/users/profile/{}", self.api_base, self.settings.user_id);
        let topics = self.settings.topics.join(",");
        let max_subtopics = self.settings.max_subtopic_size.to_string();

        debug!(user_id = %self.settings.user_id, topics = %topics, "Fetching profile");
        self.get_user().await?;

        let data = self
            .call(self.client.get(&url).query(&[
                ("only_topics", topics.as_str()),
                ("max_subtopic_size", max_subtopics.as_str()),
            ]))
            .await?;

        let profiles: ProfileData = serde_json::from_value(data)
            .map_err(|e| MemoryError::InvalidResponse(format!("profile list: {e}")))?;

        Ok(nest_profiles(profiles.profiles))
    }

    async fn insert_turn(&self, messages: &[Message]) -> Result<(), MemoryError> {
        self.get_user().await?;

        let insert_url = format!("{}/blobs/insert/{}", self.api_base, self.settings.user_id);
        let blob = ChatBlob {
            blob_type: "chat",
            blob_data: ChatBlobData {
                messages: messages
                    .iter()
                    .map(|m| BlobMessage {
                        role: m.role.as_str(),
                        content: &m.content,
                    })
                    .collect(),
            },
        };

        self.call(self.client.post(&insert_url).json(&blob)).await?;

        // Flush synchronously so the profile reflects this turn
        let flush_url = format!("{}/users/buffer/{}/chat", self.api_base, self.settings.user_id);
        self.call(
            self.client
                .post(&flush_url)
                .query(&[("wait_process", "true")]),
        )
        .await?;

        debug!(
            user_id = %self.settings.user_id,
            messages = messages.len(),
            "Turn inserted and flushed"
        );
        Ok(())
    }
}

/// Reshape the flat profile list into `{topic: {sub_topic: {id, content, ..}}}`.
///
/// Later entries for the same topic/sub-topic replace earlier ones.
fn nest_profiles(profiles: Vec<ApiProfile>) -> Value {
    let mut root = Map::new();
    for profile in profiles {
        let topic = root
            .entry(profile.attributes.topic)
            .or_insert_with(|| Value::Object(Map::new()));

        let mut leaf = Map::new();
        leaf.insert("id".into(), Value::String(profile.id));
        leaf.insert("content".into(), Value::String(profile.content));
        if let Some(created) = profile.created_at {
            leaf.insert("created_at".into(), created);
        }
        if let Some(updated) = profile.updated_at {
            leaf.insert("updated_at".into(), updated);
        }

        if let Value::Object(sub_topics) = topic {
            sub_topics.insert(profile.attributes.sub_topic, Value::Object(leaf));
        }
    }
    Value::Object(root)
}

// --- Memobase API types (internal) ---

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errno: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    #[serde(default)]
    profiles: Vec<ApiProfile>,
}

#[derive(Debug, Deserialize)]
struct ApiProfile {
    id: String,
    content: String,
    attributes: ProfileAttributes,
    #[serde(default)]
    created_at: Option<Value>,
    #[serde(default)]
    updated_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ProfileAttributes {
    topic: String,
    sub_topic: String,
}

#[derive(Debug, Serialize)]
struct ChatBlob<'a> {
    blob_type: &'static str,
    blob_data: ChatBlobData<'a>,
}

#[derive(Debug, Serialize)]
struct ChatBlobData<'a> {
    messages: Vec<BlobMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct BlobMessage<'a> {
    role: &'static str,
    content: &'a str,
}
