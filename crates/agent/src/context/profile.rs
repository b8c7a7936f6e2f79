//! User profile extraction and rendering.
//!
//! The memory service returns an arbitrarily nested JSON document. A node is
//! a profile entry when it is an object carrying both an `id` and a string
//! `content`; every other object is grouping and is walked recursively. The
//! walk flattens everything into one ordered `key → content` map.

use regex_lite::Regex;
use serde_json::Value;

/// Rendered in place of the profile block when there is nothing to show.
pub const EMPTY_PROFILE: &str = "无特定用户画像信息。";

/// Rendered when the profile could not be fetched at all.
pub const PROFILE_UNAVAILABLE: &str = "暂无用户画像信息";

/// Inline `[mention ...]` markers the memory service leaves in content.
const MENTION_PATTERN: &str = r"\s*\[mention.*?\]\s*";

/// A profile document node.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileNode {
    /// An entry with an identifier and text.
    Leaf { id: Value, content: String },
    /// Named children in document order.
    Group(Vec<(String, ProfileNode)>),
    /// Anything that is not an object.
    Scalar,
}

impl ProfileNode {
    pub fn parse(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::Scalar;
        };

        if let (Some(id), Some(Value::String(content))) = (map.get("id"), map.get("content")) {
            return Self::Leaf {
                id: id.clone(),
                content: content.clone(),
            };
        }

        Self::Group(
            map.iter()
                .map(|(key, child)| (key.clone(), Self::parse(child)))
                .collect(),
        )
    }
}

/// Flat, insertion-ordered `topic key → cleaned content` map.
///
/// Inserting an existing key replaces its value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedProfile {
    entries: Vec<(String, String)>,
}

impl ExtractedProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, content: impl Into<String>) {
        let key = key.into();
        let content = content.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = content,
            None => self.entries.push((key, content)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flatten a profile document into its entries.
pub fn extract_profile(document: &Value) -> ExtractedProfile {
    let mut out = ExtractedProfile::new();
    let Value::Object(map) = document else {
        return out;
    };

    let mention = Regex::new(MENTION_PATTERN).ok();
    for (key, child) in map {
        visit(key, &ProfileNode::parse(child), mention.as_ref(), &mut out);
    }
    out
}

fn visit(key: &str, node: &ProfileNode, mention: Option<&Regex>, out: &mut ExtractedProfile) {
    match node {
        ProfileNode::Leaf { content, .. } => out.insert(key, clean_with(content, mention)),
        ProfileNode::Group(children) => {
            for (child_key, child) in children {
                visit(child_key, child, mention, out);
            }
        }
        ProfileNode::Scalar => {}
    }
}

/// Strip mention markers and normalise whitespace.
pub fn clean_content(text: &str) -> String {
    clean_with(text, Regex::new(MENTION_PATTERN).ok().as_ref())
}

fn clean_with(text: &str, mention: Option<&Regex>) -> String {
    let stripped = match mention {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render the profile as `- Label: content` lines.
pub fn format_profile(profile: &ExtractedProfile) -> String {
    if profile.is_empty() {
        return EMPTY_PROFILE.to_string();
    }

    profile
        .iter()
        .map(|(key, content)| format!("- {}: {}", label(key), content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `life_event` → `Life event`.
fn label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
