//! Configuration for the knowledge subsystem.
//!
//! The embedding process builds a [`KnowledgeConfig`] and hands it to
//! the service at construction. This crate never reads environment
//! variables itself.

use std::path::PathBuf;
use std::time::Duration;

/// Construction-time configuration for the knowledge store.
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    /// Path of the single-file embedded database.
    pub db_path: PathBuf,

    /// Time-to-live for assembled context strings.
    pub cache_ttl: Duration,

    /// Default number of entries included in an assembled context.
    pub context_limit: usize,

    /// Relative weights used when re-ranking search candidates.
    pub ranking: RankingWeights,
}

impl KnowledgeConfig {
    /// Create a config for the given database path with defaults.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            cache_ttl: Duration::from_secs(3600),
            context_limit: 5,
            ranking: RankingWeights::default(),
        }
    }

    /// Set the context-cache TTL.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the default context entry limit.
    #[must_use]
    pub fn context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    /// Override the ranking weights.
    #[must_use]
    pub fn ranking(mut self, weights: RankingWeights) -> Self {
        self.ranking = weights;
        self
    }
}

/// Weights for the composite relevance score used by context assembly.
///
/// These are tuning knobs, not a fixed algorithm: the right balance
/// between text relevance and provenance trust depends on how the
/// community actually asks questions. Defaults favor verified and
/// curated entries over chat-extracted ones.
#[derive(Debug, Clone)]
pub struct RankingWeights {
    /// Multiplier applied to the entry's own confidence value.
    pub confidence_weight: f64,

    /// Score added per tag shared between the query and the entry.
    pub tag_match_weight: f64,

    /// Score added per topic term found in the entry's searchable text.
    pub topic_term_weight: f64,

    /// Boost for entries confirmed by multiple sources.
    pub verified_boost: f64,

    /// Boost for curated seed entries.
    pub static_boost: f64,

    /// Boost for entries extracted from chat messages.
    pub dynamic_boost: f64,

    /// Boost for entries flagged as potentially stale.
    pub outdated_boost: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            confidence_weight: 0.3,
            tag_match_weight: 0.2,
            topic_term_weight: 0.1,
            verified_boost: 0.3,
            static_boost: 0.2,
            dynamic_boost: 0.1,
            outdated_boost: 0.0,
        }
    }
}
