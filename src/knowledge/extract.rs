//! Fact-extraction collaborator seam.
//!
//! Turning a chat message into a structured fact is delegated to the
//! embedding process (typically an LLM call). This crate only defines
//! the seam and stores whatever comes back as dynamic knowledge.

use futures::future::BoxFuture;

use crate::database::models::{KnowledgeContent, KnowledgeUpdate};

/// A structured fact pulled out of a chat message.
#[derive(Debug, Clone)]
pub struct ExtractedFact {
    /// Id for the resulting entry, e.g. `general_lobby_freezes`.
    pub id: String,

    pub content: KnowledgeContent,

    /// Extractor's own confidence; capped below 1.0 when stored, since
    /// chat-derived knowledge never outranks curated entries.
    pub confidence: f64,

    pub tags: Vec<String>,

    pub context_tags: Vec<String>,
}

/// Extracts structured facts from chat messages.
///
/// Object-safe so the service can hold `Box<dyn FactExtractor>`.
/// Returning `None` means the message carried no extractable fact;
/// that is the common case and not an error.
pub trait FactExtractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        update: &'a KnowledgeUpdate,
    ) -> BoxFuture<'a, Option<ExtractedFact>>;
}
