//! Dynamic knowledge-update input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message offered to the knowledge base for fact extraction.
///
/// Supplied by the chat-ingestion layer; this crate does not parse or
/// validate chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeUpdate {
    pub message_text: String,

    pub message_id: String,

    pub chat_id: i64,

    pub username: String,

    pub timestamp: DateTime<Utc>,

    /// Topic labels attached by the ingestion layer.
    #[serde(default)]
    pub topic_tags: Vec<String>,
}
