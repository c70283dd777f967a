//! warlore - game knowledge store for the War Legends assistant.
//!
//! A hybrid structured/full-text knowledge base used to assemble
//! retrieval context for LLM prompts. The embedding bot process owns
//! chat transport and prompt building; this crate owns the knowledge.
//!
//! ## Architecture
//!
//! - `config` - construction-time configuration (no env reads)
//! - `error` - error taxonomy
//! - `cache` - TTL caching with Moka
//! - `database` - SQLite record store, FTS index and CRUD repository
//! - `knowledge` - domain service: typed entities, context assembly,
//!   dynamic ingestion

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod knowledge;

pub use cache::{CacheConfig, CacheRegistry, TypedCache};
pub use config::{KnowledgeConfig, RankingWeights};
pub use database::models::{
    Building, EntryPatch, Faction, General, KnowledgeContent, KnowledgeEntry, KnowledgeSource,
    KnowledgeType, KnowledgeUpdate, Mechanic, Player, Strategy, TimingWindow, Unit,
};
pub use database::{EntryRepository, KnowledgeDb, KnowledgeStats};
pub use error::{KnowledgeError, Result};
pub use knowledge::{ExtractedFact, FactExtractor, KnowledgeService};
