//! Memory domain types — the persisted units of conversation and knowledge.
//!
//! A `Memory` is immutable once created: it is written on message or
//! knowledge ingestion, never updated, and deleted only by explicit
//! room-scoped purge. Its `id` is globally unique; creating a memory whose
//! id already exists is a no-op, not an overwrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A single persisted memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Globally unique ID for this memory
    pub id: Uuid,

    /// The user this memory originated from
    pub user_id: Uuid,

    /// The agent that owns this memory
    pub agent_id: Uuid,

    /// The room (conversation scope) this memory belongs to
    pub room_id: Uuid,

    /// Structured content (text plus metadata)
    pub content: Content,

    /// Optional embedding vector for similarity search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// When this memory was created
    pub created_at: DateTime<Utc>,

    /// Whether this record was created with the uniqueness constraint
    #[serde(default)]
    pub unique: bool,
}

impl Memory {
    /// Create a new memory with a fresh id and the current timestamp.
    pub fn new(user_id: Uuid, agent_id: Uuid, room_id: Uuid, content: Content) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            agent_id,
            room_id,
            content,
            embedding: None,
            created_at: Utc::now(),
            unique: false,
        }
    }

    /// First segment of the id, used by transcript formatting.
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

/// Structured message/knowledge content.
///
/// Unknown fields are preserved in `extra` so third-party capability modules
/// can round-trip their own metadata through storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    /// The text body
    #[serde(default)]
    pub text: String,

    /// Declared action name, if the content carries an actionable intent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Where this content came from (platform tag, ingestion source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Optional canonical URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// The memory this content replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,

    /// Attached media
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Media>,

    /// Passthrough metadata from capability modules
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Content {
    /// Plain-text content with no metadata.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Parse stored content, recovering from historical mis-encodings.
    ///
    /// Attempts, in order: structured JSON, double-encoded JSON (a JSON
    /// string whose value is itself JSON), then falls back to treating the
    /// value as plain text. This is a read-compatibility shim only — the
    /// canonical write path always produces plain JSON.
    pub fn parse(raw: &str) -> Self {
        if let Ok(content) = serde_json::from_str::<Content>(raw) {
            return content;
        }
        if let Ok(inner) = serde_json::from_str::<String>(raw) {
            if let Ok(content) = serde_json::from_str::<Content>(&inner) {
                debug!("recovered double-encoded content");
                return content;
            }
            return Content::from_text(inner.trim());
        }
        debug!("stored content is not JSON, treating as plain text");
        Content::from_text(raw.trim())
    }
}

/// An attachment carried by a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub url: String,
    pub title: String,
    pub source: String,
    pub description: String,
    /// Extracted text. Replaced with `"[Hidden]"` when the attachment falls
    /// outside the trailing freshness window during state composition.
    pub text: String,
}

/// Parameters for a room-scoped memory read.
#[derive(Debug, Clone)]
pub struct GetMemoriesParams {
    pub room_id: Uuid,
    /// Maximum number of records to return (newest first)
    pub count: Option<usize>,
    /// Restrict to records created with the uniqueness constraint
    pub unique: bool,
    /// Inclusive lower bound on creation time
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on creation time
    pub end: Option<DateTime<Utc>>,
}

impl GetMemoriesParams {
    pub fn room(room_id: Uuid) -> Self {
        Self {
            room_id,
            count: None,
            unique: false,
            start: None,
            end: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn unique_only(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Parameters for embedding similarity search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Minimum similarity for a hit. Permissive by default.
    pub match_threshold: f32,
    /// Maximum number of hits
    pub count: usize,
    /// Restrict to a single room; `None` searches agent-wide
    pub room_id: Option<Uuid>,
    /// Restrict to memories owned by one agent; `None` searches store-wide
    pub agent_id: Option<Uuid>,
    pub unique: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            match_threshold: 0.1,
            count: 10,
            room_id: None,
            agent_id: None,
            unique: false,
        }
    }
}
