//! Knowledge entry metadata model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

use super::content::KnowledgeContent;

/// Category of game knowledge an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeType {
    Unit,
    Building,
    Strategy,
    Timing,
    Player,
    Meta,
    Mechanics,
    General,
}

impl KnowledgeType {
    /// Stable string form used for the indexed type column.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeType::Unit => "unit",
            KnowledgeType::Building => "building",
            KnowledgeType::Strategy => "strategy",
            KnowledgeType::Timing => "timing",
            KnowledgeType::Player => "player",
            KnowledgeType::Meta => "meta",
            KnowledgeType::Mechanics => "mechanics",
            KnowledgeType::General => "general",
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self> {
        match s {
            "unit" => Ok(KnowledgeType::Unit),
            "building" => Ok(KnowledgeType::Building),
            "strategy" => Ok(KnowledgeType::Strategy),
            "timing" => Ok(KnowledgeType::Timing),
            "player" => Ok(KnowledgeType::Player),
            "meta" => Ok(KnowledgeType::Meta),
            "mechanics" => Ok(KnowledgeType::Mechanics),
            "general" => Ok(KnowledgeType::General),
            other => Err(KnowledgeError::StoreUnavailable(format!(
                "unknown knowledge type in store: {other}"
            ))),
        }
    }
}

/// Provenance tier of an entry, used to weight trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeSource {
    /// Curated seed data.
    Static,
    /// Extracted from chat messages.
    Dynamic,
    /// Confirmed by multiple sources.
    Verified,
    /// Flagged as potentially stale.
    Outdated,
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeSource::Static => "static",
            KnowledgeSource::Dynamic => "dynamic",
            KnowledgeSource::Verified => "verified",
            KnowledgeSource::Outdated => "outdated",
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(KnowledgeSource::Static),
            "dynamic" => Ok(KnowledgeSource::Dynamic),
            "verified" => Ok(KnowledgeSource::Verified),
            "outdated" => Ok(KnowledgeSource::Outdated),
            other => Err(KnowledgeError::StoreUnavailable(format!(
                "unknown knowledge source in store: {other}"
            ))),
        }
    }
}

/// One persisted knowledge record.
///
/// `kind` is immutable after creation; `updated_at` moves forward on
/// every mutation and is never earlier than `created_at`.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    /// Caller-supplied unique id, e.g. `unit_swordsman`.
    pub id: String,

    pub kind: KnowledgeType,

    pub source: KnowledgeSource,

    pub content: KnowledgeContent,

    /// Relevance/trust weight in `[0, 1]`, independent of `source`.
    pub confidence: f64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Related entry ids or message ids. Informational only.
    pub references: Vec<String>,

    /// Short machine-oriented labels for filtering.
    pub tags: Vec<String>,

    /// Natural-language labels for fuzzy topic matching.
    pub context_tags: Vec<String>,
}

impl KnowledgeEntry {
    /// Create an entry around a payload. The type is derived from the
    /// payload variant; confidence defaults to 1.0.
    pub fn new(id: impl Into<String>, source: KnowledgeSource, content: KnowledgeContent) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind: content.kind(),
            source,
            content,
            confidence: 1.0,
            created_at: now,
            updated_at: now,
            references: Vec::new(),
            tags: Vec::new(),
            context_tags: Vec::new(),
        }
    }

    /// Override the derived type. Only valid for type/payload pairs
    /// that [`KnowledgeContent::matches`] accepts (meta and timing
    /// entries carry the general payload).
    #[must_use]
    pub fn kind(mut self, kind: KnowledgeType) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn context_tags(mut self, context_tags: Vec<String>) -> Self {
        self.context_tags = context_tags;
        self
    }

    #[must_use]
    pub fn references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    /// Flattened natural-language text indexed for full-text search.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.tags.iter().map(String::as_str));
        parts.extend(self.context_tags.iter().map(String::as_str));
        parts.extend(self.content.searchable_parts());
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" ")
    }

    /// Check the entry invariants before it reaches the store.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(KnowledgeError::Validation("entry id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(KnowledgeError::Validation(format!(
                "confidence must be in [0, 1], got {}",
                self.confidence
            )));
        }
        if !self.content.matches(self.kind) {
            return Err(KnowledgeError::Validation(format!(
                "payload shape does not match entry type {}",
                self.kind.as_str()
            )));
        }
        self.content.validate().map_err(KnowledgeError::Validation)
    }
}

/// Partial-field update applied by [`update`].
///
/// The entry type is deliberately absent: type is immutable.
///
/// [`update`]: crate::database::EntryRepository::update
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub content: Option<KnowledgeContent>,
    pub source: Option<KnowledgeSource>,
    pub confidence: Option<f64>,
    pub references: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub context_tags: Option<Vec<String>>,
}

impl EntryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn content(mut self, content: KnowledgeContent) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub fn source(mut self, source: KnowledgeSource) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn references(mut self, references: Vec<String>) -> Self {
        self.references = Some(references);
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn context_tags(mut self, context_tags: Vec<String>) -> Self {
        self.context_tags = Some(context_tags);
        self
    }
}
