//! Context assembly: candidate scoring, grouping and rendering.

use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::config::RankingWeights;
use crate::database::models::{KnowledgeContent, KnowledgeEntry, KnowledgeSource, KnowledgeType};

/// Fixed section order; rendering must be deterministic for identical
/// store state.
const SECTIONS: [(KnowledgeType, &str); 8] = [
    (KnowledgeType::Unit, "UNITS"),
    (KnowledgeType::Building, "BUILDINGS"),
    (KnowledgeType::Strategy, "STRATEGIES"),
    (KnowledgeType::Mechanics, "MECHANICS"),
    (KnowledgeType::Player, "PLAYERS"),
    (KnowledgeType::Meta, "META"),
    (KnowledgeType::Timing, "TIMINGS"),
    (KnowledgeType::General, "GENERAL"),
];

const GENERAL_GAME_SUMMARY: &str = "\
War Legends is a mobile RTS built around these core elements:
- Unit types across two factions (infantry, cavalry, ranged, siege)
- A building and upgrade system
- Clan wars and PvP battles
- Distinct strategy archetypes (rush, boom, turtle)
- A ladder rating for players

Ask about a specific unit, building or strategy for details.";

/// Result of candidate selection, kept explicit so "no matches, store
/// healthy" is distinguishable from a degraded store before rendering.
#[derive(Debug, Clone)]
pub(crate) enum ContextOutcome {
    /// Ranked entries, best first, already capped at the limit.
    Matched(Vec<KnowledgeEntry>),
    /// Nothing matched; render the general game summary.
    Fallback,
}

impl ContextOutcome {
    pub(crate) fn is_fallback(&self) -> bool {
        matches!(self, ContextOutcome::Fallback)
    }

    /// Render into the plain-text block consumed by the prompt
    /// builder. Never empty.
    pub(crate) fn render(&self) -> String {
        let entries = match self {
            ContextOutcome::Fallback => return GENERAL_GAME_SUMMARY.to_string(),
            ContextOutcome::Matched(entries) if entries.is_empty() => {
                return GENERAL_GAME_SUMMARY.to_string();
            }
            ContextOutcome::Matched(entries) => entries,
        };

        let mut by_type: BTreeMap<&'static str, Vec<&KnowledgeEntry>> = BTreeMap::new();
        for entry in entries {
            let label = section_label(entry.kind);
            by_type.entry(label).or_default().push(entry);
        }

        let mut parts = vec!["=== WAR LEGENDS GAME CONTEXT ===".to_string()];
        for (_, label) in SECTIONS {
            if let Some(group) = by_type.get(label) {
                parts.push(format!("\n{label}:"));
                for entry in group {
                    parts.push(render_entry(entry));
                }
            }
        }
        parts.join("\n")
    }
}

fn section_label(kind: KnowledgeType) -> &'static str {
    SECTIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, label)| *label)
        .unwrap_or("GENERAL")
}

/// Re-rank search candidates by the composite relevance score and cap
/// at `limit`. Ties break on id so the result is stable.
pub(crate) fn rank_entries(
    mut candidates: Vec<KnowledgeEntry>,
    topic: &str,
    tags: Option<&[String]>,
    message_context: Option<&str>,
    weights: &RankingWeights,
    limit: usize,
) -> Vec<KnowledgeEntry> {
    let mut topic_terms: HashSet<String> = topic
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if let Some(extra) = message_context {
        topic_terms.extend(extra.to_lowercase().split_whitespace().map(str::to_string));
    }

    let mut scored: Vec<(f64, KnowledgeEntry)> = candidates
        .drain(..)
        .map(|entry| {
            let score = relevance_score(&entry, &topic_terms, tags, weights);
            (score, entry)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.id.cmp(&b.1.id))
    });

    scored.into_iter().take(limit).map(|(_, entry)| entry).collect()
}

fn relevance_score(
    entry: &KnowledgeEntry,
    topic_terms: &HashSet<String>,
    tags: Option<&[String]>,
    weights: &RankingWeights,
) -> f64 {
    let mut score = entry.confidence * weights.confidence_weight;

    if let Some(tags) = tags {
        let entry_tags: HashSet<&str> = entry
            .tags
            .iter()
            .chain(entry.context_tags.iter())
            .chain(entry.content.tags().iter())
            .map(String::as_str)
            .collect();
        let overlap = tags.iter().filter(|t| entry_tags.contains(t.as_str())).count();
        score += overlap as f64 * weights.tag_match_weight;
    }

    let entry_text = entry.searchable_text().to_lowercase();
    let hits = topic_terms.iter().filter(|term| entry_text.contains(*term)).count();
    score += hits as f64 * weights.topic_term_weight;

    score += match entry.source {
        KnowledgeSource::Verified => weights.verified_boost,
        KnowledgeSource::Static => weights.static_boost,
        KnowledgeSource::Dynamic => weights.dynamic_boost,
        KnowledgeSource::Outdated => weights.outdated_boost,
    };

    score
}

fn render_entry(entry: &KnowledgeEntry) -> String {
    match &entry.content {
        KnowledgeContent::Unit(unit) => format!(
            "- {} ({}, tier {})\n  Stats: {}\n  Strong against: {}\n  Weak against: {}\n  {}",
            unit.name,
            unit.category,
            unit.tier,
            format_number_map(&unit.stats),
            format_list(&unit.counters),
            format_list(&unit.countered_by),
            unit.description,
        ),
        KnowledgeContent::Building(building) => format!(
            "- {} ({}, max level {})\n  {}",
            building.name, building.category, building.max_level, building.description,
        ),
        KnowledgeContent::Strategy(strategy) => {
            let mut text = format!(
                "- {} ({}, difficulty: {})\n  {}\n  Composition: {}\n  Strong against: {}",
                strategy.name,
                strategy.category,
                strategy.difficulty,
                strategy.description,
                format_count_map(&strategy.unit_composition),
                format_list(&strategy.strong_against),
            );
            if !strategy.timing_windows.is_empty() {
                let steps: Vec<String> = strategy
                    .timing_windows
                    .iter()
                    .map(|w| format!("{} {}", w.time, w.action))
                    .collect();
                text.push_str(&format!("\n  Timing: {}", steps.join("; ")));
            }
            text
        }
        KnowledgeContent::Mechanic(mechanic) => {
            let mut text = format!("- {}: {}", mechanic.name, mechanic.description);
            if let Some(formula) = &mechanic.formula {
                text.push_str(&format!("\n  Formula: {formula}"));
            }
            text
        }
        KnowledgeContent::Player(player) => {
            let rating = player
                .rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unrated".to_string());
            let clan = player.clan.as_deref().unwrap_or("no clan");
            format!(
                "- {} (rating {rating}, {clan})\n  Prefers: {}",
                player.handle,
                format_list(&player.preferred_strategies),
            )
        }
        KnowledgeContent::General(general) => {
            format!("- {}: {}", general.title, general.description)
        }
    }
}

fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        "no data".to_string()
    } else {
        items.join(", ")
    }
}

fn format_number_map(map: &BTreeMap<String, f64>) -> String {
    if map.is_empty() {
        return "no data".to_string();
    }
    map.iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_count_map(map: &BTreeMap<String, u32>) -> String {
    if map.is_empty() {
        return "no data".to_string();
    }
    map.iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{KnowledgeEntry, Strategy, Unit};

    fn unit(id: &str, name: &str, source: KnowledgeSource, confidence: f64) -> KnowledgeEntry {
        KnowledgeEntry::new(
            id,
            source,
            KnowledgeContent::Unit(Unit {
                name: name.into(),
                category: "infantry".into(),
                tier: 1,
                description: format!("{name} holds the line."),
                ..Default::default()
            }),
        )
        .confidence(confidence)
    }

    fn strategy(id: &str, name: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(
            id,
            KnowledgeSource::Static,
            KnowledgeContent::Strategy(Strategy {
                name: name.into(),
                category: "rush".into(),
                difficulty: "beginner".into(),
                description: "Early pressure.".into(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_fallback_renders_general_summary() {
        let text = ContextOutcome::Fallback.render();
        assert!(text.contains("War Legends"));
        assert!(!text.is_empty());

        // An empty match list degrades the same way.
        assert_eq!(ContextOutcome::Matched(vec![]).render(), text);
    }

    #[test]
    fn test_verified_outranks_dynamic_at_equal_confidence() {
        let candidates = vec![
            unit("unit_dynamic", "Militia", KnowledgeSource::Dynamic, 0.8),
            unit("unit_verified", "Militia", KnowledgeSource::Verified, 0.8),
        ];
        let ranked = rank_entries(candidates, "militia", None, None, &RankingWeights::default(), 2);
        assert_eq!(ranked[0].id, "unit_verified");
    }

    #[test]
    fn test_tag_overlap_boosts_rank() {
        let tagged = unit("unit_tagged", "Knight", KnowledgeSource::Static, 0.5)
            .tags(vec!["melee".into()]);
        let untagged = unit("unit_plain", "Archer", KnowledgeSource::Static, 0.5);

        let tags = vec!["melee".to_string()];
        let ranked = rank_entries(
            vec![untagged, tagged],
            "unrelated topic",
            Some(&tags),
            None,
            &RankingWeights::default(),
            2,
        );
        assert_eq!(ranked[0].id, "unit_tagged");
    }

    #[test]
    fn test_render_groups_by_type_in_fixed_order() {
        let outcome = ContextOutcome::Matched(vec![
            strategy("strategy_rush", "Archer Rush"),
            unit("unit_swordsman", "Swordsman", KnowledgeSource::Static, 1.0),
        ]);
        let text = outcome.render();

        let units_at = text.find("UNITS:").expect("units section");
        let strategies_at = text.find("STRATEGIES:").expect("strategies section");
        assert!(units_at < strategies_at);
        assert!(text.contains("- Swordsman (infantry, tier 1)"));
        assert!(text.contains("- Archer Rush (rush, difficulty: beginner)"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let make = || {
            ContextOutcome::Matched(vec![
                unit("unit_swordsman", "Swordsman", KnowledgeSource::Static, 1.0),
                strategy("strategy_rush", "Archer Rush"),
            ])
        };
        assert_eq!(make().render(), make().render());
    }
}
