//! Knowledge service - domain API over the entry repository.

use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::config::KnowledgeConfig;
use crate::database::models::{
    Building, General, KnowledgeContent, KnowledgeEntry, KnowledgeSource, KnowledgeType,
    KnowledgeUpdate, Mechanic, Player, Strategy, Unit,
};
use crate::database::{EntryRepository, KnowledgeDb, KnowledgeStats};
use crate::error::{KnowledgeError, Result};

use super::context::{ContextOutcome, rank_entries};
use super::extract::FactExtractor;
use super::seeds;

/// Chat-derived entries never reach full confidence.
const MAX_DYNAMIC_CONFIDENCE: f64 = 0.9;

/// Service for managing War Legends game knowledge.
///
/// One instance per process, shared by cloning the handles it wraps.
/// The assembled-context cache is created from the registry at
/// construction and owned here, not process-global.
pub struct KnowledgeService {
    db: KnowledgeDb,
    entries: EntryRepository,
    context_cache: TypedCache<String, String>,
    config: KnowledgeConfig,
    extractor: Option<Box<dyn FactExtractor>>,
}

impl KnowledgeService {
    /// Open the database at the configured path and wire up the
    /// context cache.
    pub async fn connect(config: KnowledgeConfig, cache_registry: &CacheRegistry) -> Result<Self> {
        let db = KnowledgeDb::open(config.db_path.clone()).await?;
        let context_cache = cache_registry.get_or_create(
            "knowledge_context",
            CacheConfig::context_cache(config.cache_ttl),
        );

        Ok(Self {
            entries: EntryRepository::new(db.clone()),
            db,
            context_cache,
            config,
            extractor: None,
        })
    }

    /// Attach the fact-extraction collaborator used by
    /// [`update_knowledge_from_message`](Self::update_knowledge_from_message).
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn FactExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Load the static seed set. Idempotent: the schema is ensured at
    /// connect time, seed ids are deterministic and existing ids are
    /// skipped. Returns the number of entries actually inserted.
    pub async fn initialize(&self) -> Result<usize> {
        let inserted = self.entries.create_batch(seeds::seed_entries()).await?;
        if inserted > 0 {
            info!("Loaded {inserted} static knowledge entries");
        }
        Ok(inserted)
    }

    /// Direct access to the CRUD layer.
    pub fn entries(&self) -> &EntryRepository {
        &self.entries
    }

    /// Store queries issued so far; lets tests observe cache hits.
    pub fn query_count(&self) -> u64 {
        self.db.query_count()
    }

    /// Validate and store a pre-built entry.
    pub async fn add_entry(&self, entry: &KnowledgeEntry) -> Result<()> {
        self.entries.create(entry).await?;
        debug!("Added knowledge entry: {}", entry.id);
        Ok(())
    }

    /// Create and store a unit entry under `unit_{id}`.
    pub async fn create_unit(
        &self,
        id: &str,
        unit: Unit,
        source: KnowledgeSource,
        tags: Vec<String>,
        context_tags: Vec<String>,
    ) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry::new(
            format!("unit_{id}"),
            source,
            KnowledgeContent::Unit(unit),
        )
        .tags(tags)
        .context_tags(context_tags);
        self.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Create and store a building entry under `building_{id}`.
    pub async fn create_building(
        &self,
        id: &str,
        building: Building,
        source: KnowledgeSource,
        tags: Vec<String>,
        context_tags: Vec<String>,
    ) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry::new(
            format!("building_{id}"),
            source,
            KnowledgeContent::Building(building),
        )
        .tags(tags)
        .context_tags(context_tags);
        self.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Create and store a strategy entry under `strategy_{id}`.
    pub async fn create_strategy(
        &self,
        id: &str,
        strategy: Strategy,
        source: KnowledgeSource,
        tags: Vec<String>,
        context_tags: Vec<String>,
    ) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry::new(
            format!("strategy_{id}"),
            source,
            KnowledgeContent::Strategy(strategy),
        )
        .tags(tags)
        .context_tags(context_tags);
        self.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Create and store a mechanic entry under `mechanic_{id}`.
    pub async fn create_mechanic(
        &self,
        id: &str,
        mechanic: Mechanic,
        source: KnowledgeSource,
        tags: Vec<String>,
        context_tags: Vec<String>,
    ) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry::new(
            format!("mechanic_{id}"),
            source,
            KnowledgeContent::Mechanic(mechanic),
        )
        .tags(tags)
        .context_tags(context_tags);
        self.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Create and store a player entry keyed by the lowercased handle.
    pub async fn create_player(
        &self,
        player: Player,
        source: KnowledgeSource,
        tags: Vec<String>,
        context_tags: Vec<String>,
    ) -> Result<KnowledgeEntry> {
        let id = format!("player_{}", player.handle.to_lowercase());
        let entry = KnowledgeEntry::new(id, source, KnowledgeContent::Player(player))
            .tags(tags)
            .context_tags(context_tags);
        self.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Create and store a free-form entry under `general_{id}`.
    pub async fn create_general(
        &self,
        id: &str,
        general: General,
        source: KnowledgeSource,
        tags: Vec<String>,
        context_tags: Vec<String>,
    ) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry::new(
            format!("general_{id}"),
            source,
            KnowledgeContent::General(general),
        )
        .tags(tags)
        .context_tags(context_tags);
        self.add_entry(&entry).await?;
        Ok(entry)
    }

    /// Assemble relevant game context for a topic as a plain-text
    /// block for prompt injection.
    ///
    /// Results are cached for the configured TTL, keyed by the
    /// normalized `(topic, tags, message_context, limit)` tuple; a hit
    /// performs no store query. Zero matches render the general game
    /// summary, never an error; store unavailability still propagates.
    pub async fn get_game_context(
        &self,
        topic: &str,
        tags: Option<&[String]>,
        message_context: Option<&str>,
        limit: Option<usize>,
    ) -> Result<String> {
        let limit = limit.unwrap_or(self.config.context_limit);
        let key = context_cache_key(topic, tags, message_context, limit);

        if let Some(cached) = self.context_cache.get(&key) {
            debug!("Context cache hit for topic '{topic}'");
            return Ok(cached);
        }

        let outcome = self.assemble_context(topic, tags, message_context, limit).await?;
        if outcome.is_fallback() {
            debug!("No knowledge matched topic '{topic}', serving general summary");
        }

        let text = outcome.render();
        self.context_cache.insert(key, text.clone());
        Ok(text)
    }

    /// Drop every cached context string. The next lookup goes back to
    /// the store.
    pub fn invalidate_context_cache(&self) {
        self.context_cache.invalidate_all();
    }

    /// Candidate selection and ranking, without cache or rendering.
    pub(crate) async fn assemble_context(
        &self,
        topic: &str,
        tags: Option<&[String]>,
        message_context: Option<&str>,
        limit: usize,
    ) -> Result<ContextOutcome> {
        // Message context widens recall; the topic alone often misses
        // entries the surrounding conversation names.
        let mut query = topic.to_string();
        if let Some(extra) = message_context {
            query.push(' ');
            query.push_str(extra);
        }

        let mut candidates = self.entries.search_fts(&query, limit * 2).await?;

        if candidates.is_empty() {
            if let Some(tags) = tags {
                candidates = self.entries.search_by_tags(tags, false, limit).await?;
            }
        }

        if candidates.is_empty() {
            return Ok(ContextOutcome::Fallback);
        }

        Ok(ContextOutcome::Matched(rank_entries(
            candidates,
            topic,
            tags,
            message_context,
            &self.config.ranking,
            limit,
        )))
    }

    /// Best-effort ingestion of a chat message.
    ///
    /// Extraction failures are logged and discarded — most messages
    /// carry no fact and that is not an error. Only store
    /// unavailability propagates. Returns whether a fact was stored.
    pub async fn update_knowledge_from_message(&self, update: &KnowledgeUpdate) -> Result<bool> {
        let Some(extractor) = &self.extractor else {
            debug!("No fact extractor configured, dropping message {}", update.message_id);
            return Ok(false);
        };

        let Some(fact) = extractor.extract(update).await else {
            debug!("No fact extracted from message {}", update.message_id);
            return Ok(false);
        };

        let mut context_tags = fact.context_tags;
        context_tags.extend(update.topic_tags.iter().cloned());

        let entry = KnowledgeEntry::new(fact.id, KnowledgeSource::Dynamic, fact.content)
            .confidence(fact.confidence.clamp(0.0, MAX_DYNAMIC_CONFIDENCE))
            .references(vec![update.message_id.clone()])
            .tags(fact.tags)
            .context_tags(context_tags);

        match self.entries.create(&entry).await {
            Ok(()) => {
                info!("Stored dynamic knowledge '{}' from message {}", entry.id, update.message_id);
                Ok(true)
            }
            Err(e @ KnowledgeError::StoreUnavailable(_)) => Err(e),
            Err(e) => {
                warn!("Discarding extracted fact '{}': {e}", entry.id);
                Ok(false)
            }
        }
    }

    /// Units filtered by category, tier and tags.
    pub async fn search_units(
        &self,
        category: Option<&str>,
        tier: Option<u32>,
        tags: Option<&[String]>,
    ) -> Result<Vec<Unit>> {
        let entries = self.entries.read_by_type(KnowledgeType::Unit, None).await?;

        let mut units = Vec::new();
        for entry in entries {
            let KnowledgeContent::Unit(unit) = entry.content else {
                continue;
            };
            if let Some(category) = category {
                if unit.category != category {
                    continue;
                }
            }
            if let Some(tier) = tier {
                if unit.tier != tier {
                    continue;
                }
            }
            if let Some(tags) = tags {
                if !tags.iter().any(|t| unit.tags.contains(t)) {
                    continue;
                }
            }
            units.push(unit);
        }
        Ok(units)
    }

    /// Player profile stored under the lowercased handle, if any.
    pub async fn get_player_info(&self, handle: &str) -> Result<Option<Player>> {
        let id = format!("player_{}", handle.to_lowercase());
        match self.entries.read(&id).await? {
            Some(entry) => match entry.content {
                KnowledgeContent::Player(player) => Ok(Some(player)),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Aggregate store statistics.
    pub async fn get_statistics(&self) -> Result<KnowledgeStats> {
        self.entries.get_statistics().await
    }

    /// Release the underlying connection. Safe to call repeatedly.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

impl std::fmt::Debug for KnowledgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeService")
            .field("db", &self.db)
            .field("cache", &self.context_cache.name())
            .field("has_extractor", &self.extractor.is_some())
            .finish()
    }
}

/// Normalized cache key for one context request.
fn context_cache_key(
    topic: &str,
    tags: Option<&[String]>,
    message_context: Option<&str>,
    limit: usize,
) -> String {
    let mut tag_list: Vec<String> = tags
        .map(|t| t.iter().map(|s| s.to_lowercase()).collect())
        .unwrap_or_default();
    tag_list.sort();

    format!(
        "{}|{}|{}|{}",
        topic.trim().to_lowercase(),
        tag_list.join(","),
        message_context.unwrap_or_default().trim().to_lowercase(),
        limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::extract::ExtractedFact;
    use chrono::Utc;
    use futures::future::BoxFuture;

    struct StubExtractor(Option<ExtractedFact>);

    impl FactExtractor for StubExtractor {
        fn extract<'a>(
            &'a self,
            _update: &'a KnowledgeUpdate,
        ) -> BoxFuture<'a, Option<ExtractedFact>> {
            let fact = self.0.clone();
            Box::pin(async move { fact })
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    async fn temp_service() -> (tempfile::TempDir, KnowledgeService) {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = KnowledgeConfig::new(dir.path().join("knowledge.db"));
        let service = KnowledgeService::connect(config, &CacheRegistry::new()).await.unwrap();
        (dir, service)
    }

    fn chat_update(text: &str) -> KnowledgeUpdate {
        KnowledgeUpdate {
            message_text: text.into(),
            message_id: "msg_100".into(),
            chat_id: -1001,
            username: "oleg".into(),
            timestamp: Utc::now(),
            topic_tags: vec!["balance".into()],
        }
    }

    fn swordsman_fact() -> ExtractedFact {
        ExtractedFact {
            id: "general_swordsman_nerf".into(),
            content: KnowledgeContent::General(General {
                title: "Swordsman nerf".into(),
                description: "Patch 1.25 reduced swordsman defense by 2.".into(),
                ..Default::default()
            }),
            confidence: 0.95,
            tags: vec!["patch".into()],
            context_tags: vec!["recent balance changes".into()],
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;

        let first = service.initialize().await?;
        assert!(first > 0);

        let second = service.initialize().await?;
        assert_eq!(second, 0);

        let stats = service.get_statistics().await?;
        assert_eq!(stats.total_entries, first as u64);
        Ok(())
    }

    #[tokio::test]
    async fn test_context_cache_hit_skips_the_store() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        service.initialize().await?;

        let first = service.get_game_context("archer rush", None, None, Some(5)).await?;
        let queries_after_first = service.query_count();

        let second = service.get_game_context("archer rush", None, None, Some(5)).await?;
        assert_eq!(first, second);
        assert_eq!(service.query_count(), queries_after_first);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidation_forces_a_fresh_store_query() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        service.initialize().await?;

        service.get_game_context("archer rush", None, None, None).await?;
        let cached_queries = service.query_count();

        service.invalidate_context_cache();
        service.get_game_context("archer rush", None, None, None).await?;
        assert!(service.query_count() > cached_queries);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_store_yields_fallback_not_error() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;

        let outcome = service.assemble_context("anything at all", None, None, 5).await?;
        assert!(outcome.is_fallback());

        let text = service.get_game_context("anything at all", None, None, None).await?;
        assert!(text.contains("War Legends"));
        Ok(())
    }

    #[tokio::test]
    async fn test_context_ranks_matching_unit_and_omits_unrelated_strategy() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;

        service
            .create_unit(
                "swordsman",
                Unit {
                    name: "Swordsman".into(),
                    category: "infantry".into(),
                    tier: 1,
                    description: "Holds the line against cavalry charges.".into(),
                    ..Default::default()
                },
                KnowledgeSource::Static,
                vec!["melee".into(), "tank".into()],
                vec!["early defense".into()],
            )
            .await?;
        service
            .create_strategy(
                "archer_rush",
                Strategy {
                    name: "Archer Rush".into(),
                    category: "rush".into(),
                    difficulty: "beginner".into(),
                    description: "Early pressure with massed archers.".into(),
                    ..Default::default()
                },
                KnowledgeSource::Static,
                vec!["aggressive".into()],
                vec![],
            )
            .await?;

        let tags = vec!["melee".to_string()];
        let text = service
            .get_game_context("cavalry defense", Some(&tags), None, Some(5))
            .await?;

        assert!(text.contains("Swordsman"));
        assert!(text.contains("UNITS:"));
        assert!(!text.contains("Archer Rush"));
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_search_catches_topics_fts_misses() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        service.initialize().await?;

        let tags = vec!["siege".to_string()];
        let outcome = service
            .assemble_context("zzz nothing matches this", Some(&tags), None, 5)
            .await?;
        assert!(!outcome.is_fallback());
        assert!(outcome.render().contains("Catapult"));
        Ok(())
    }

    #[tokio::test]
    async fn test_typed_constructors_prefix_ids() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;

        let entry = service
            .create_mechanic(
                "armor",
                Mechanic {
                    name: "Armor".into(),
                    category: "combat".into(),
                    description: "Flat damage reduction.".into(),
                    ..Default::default()
                },
                KnowledgeSource::Static,
                vec![],
                vec![],
            )
            .await?;
        assert_eq!(entry.id, "mechanic_armor");
        assert_eq!(entry.kind, KnowledgeType::Mechanics);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_entry_rejects_kind_payload_mismatch() {
        let (_dir, service) = temp_service().await;

        let entry = KnowledgeEntry::new(
            "unit_fake",
            KnowledgeSource::Static,
            KnowledgeContent::Unit(Unit {
                name: "Fake".into(),
                category: "infantry".into(),
                tier: 1,
                ..Default::default()
            }),
        )
        .kind(KnowledgeType::Building);

        let err = service.add_entry(&entry).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_dynamic_ingestion_stores_capped_confidence() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        let service = service.with_extractor(Box::new(StubExtractor(Some(swordsman_fact()))));

        let stored = service
            .update_knowledge_from_message(&chat_update("they nerfed swordsman defense"))
            .await?;
        assert!(stored);

        let entry = service.entries().read("general_swordsman_nerf").await?.unwrap();
        assert_eq!(entry.source, KnowledgeSource::Dynamic);
        assert!(entry.confidence < 1.0);
        assert_eq!(entry.references, vec!["msg_100".to_string()]);
        // Topic tags from the message ride along as context tags.
        assert!(entry.context_tags.contains(&"balance".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_extraction_is_swallowed() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        let service = service.with_extractor(Box::new(StubExtractor(None)));

        let stored = service.update_knowledge_from_message(&chat_update("gg wp")).await?;
        assert!(!stored);
        assert_eq!(service.get_statistics().await?.total_entries, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_units_filters() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        service.initialize().await?;

        let cavalry = service.search_units(Some("cavalry"), None, None).await?;
        assert_eq!(cavalry.len(), 1);
        assert_eq!(cavalry[0].name, "Knight");

        let tier_one = service.search_units(None, Some(1), None).await?;
        assert!(tier_one.iter().all(|u| u.tier == 1));
        assert!(tier_one.len() >= 2);

        let tags = vec!["swarm".to_string()];
        let swarms = service.search_units(None, None, Some(&tags)).await?;
        assert_eq!(swarms.len(), 1);
        assert_eq!(swarms[0].name, "Ghoul");
        Ok(())
    }

    #[tokio::test]
    async fn test_player_info_roundtrip() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;

        service
            .create_player(
                Player {
                    handle: "VaLek".into(),
                    rating: Some(1840),
                    clan: Some("KK".into()),
                    preferred_strategies: vec!["strategy_archer_rush".into()],
                    ..Default::default()
                },
                KnowledgeSource::Verified,
                vec![],
                vec![],
            )
            .await?;

        let player = service.get_player_info("valek").await?.expect("player missing");
        assert_eq!(player.rating, Some(1840));
        assert!(service.get_player_info("nobody").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_surfaces_unavailability() -> anyhow::Result<()> {
        let (_dir, service) = temp_service().await;
        service.initialize().await?;

        service.close().await;
        service.close().await;

        let err = service
            .get_game_context("never cached topic", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::StoreUnavailable(_)));
        Ok(())
    }
}
