//! Curated static seed entries.
//!
//! Seed ids are deterministic, so reloading on every startup is safe:
//! existing ids are skipped by the batch insert.

use std::collections::BTreeMap;

use crate::database::models::{
    Building, Faction, General, KnowledgeContent, KnowledgeEntry, KnowledgeSource, Mechanic,
    Strategy, TimingWindow, Unit,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn stats(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn costs(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The full static seed set.
pub(crate) fn seed_entries() -> Vec<KnowledgeEntry> {
    let mut entries = Vec::new();

    entries.push(
        KnowledgeEntry::new(
            "unit_swordsman",
            KnowledgeSource::Static,
            KnowledgeContent::Unit(Unit {
                name: "Swordsman".into(),
                faction: Faction::Light,
                category: "infantry".into(),
                tier: 1,
                cost: costs(&[("gold", 60), ("food", 1)]),
                stats: stats(&[("attack", 12.0), ("defense", 20.0), ("health", 150.0)]),
                counters: strings(&["unit_archer"]),
                countered_by: strings(&["unit_knight", "unit_catapult"]),
                build_time: 18,
                description: "Frontline melee unit that soaks damage and holds the line \
                              against cavalry charges."
                    .into(),
                tags: strings(&["melee", "tank"]),
                aliases: strings(&["sword"]),
            }),
        )
        .tags(strings(&["melee", "tank"]))
        .context_tags(strings(&["holding the front line", "early defense"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "unit_archer",
            KnowledgeSource::Static,
            KnowledgeContent::Unit(Unit {
                name: "Archer".into(),
                faction: Faction::Light,
                category: "ranged".into(),
                tier: 1,
                cost: costs(&[("gold", 70), ("wood", 20)]),
                stats: stats(&[("attack", 16.0), ("defense", 6.0), ("range", 5.0)]),
                counters: strings(&["unit_ghoul"]),
                countered_by: strings(&["unit_knight"]),
                build_time: 22,
                description: "Cheap ranged damage. Melts swarms but folds the moment \
                              cavalry reaches the back line."
                    .into(),
                tags: strings(&["ranged"]),
                aliases: strings(&["bowman"]),
            }),
        )
        .tags(strings(&["ranged"]))
        .context_tags(strings(&["ranged damage from the back line"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "unit_knight",
            KnowledgeSource::Static,
            KnowledgeContent::Unit(Unit {
                name: "Knight".into(),
                faction: Faction::Light,
                category: "cavalry".into(),
                tier: 2,
                cost: costs(&[("gold", 140), ("food", 2)]),
                stats: stats(&[("attack", 24.0), ("defense", 14.0), ("speed", 9.0)]),
                counters: strings(&["unit_archer", "unit_catapult"]),
                countered_by: strings(&["unit_swordsman"]),
                build_time: 30,
                description: "Fast cavalry that charges ranged lines and siege weapons.".into(),
                tags: strings(&["cavalry", "charge"]),
                aliases: strings(&["horse"]),
            }),
        )
        .tags(strings(&["cavalry", "charge"]))
        .context_tags(strings(&["punishing exposed archers"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "unit_ghoul",
            KnowledgeSource::Static,
            KnowledgeContent::Unit(Unit {
                name: "Ghoul".into(),
                faction: Faction::Dark,
                category: "infantry".into(),
                tier: 1,
                cost: costs(&[("gold", 40)]),
                stats: stats(&[("attack", 9.0), ("defense", 5.0), ("health", 80.0)]),
                counters: strings(&[]),
                countered_by: strings(&["unit_archer"]),
                build_time: 10,
                description: "Disposable swarm unit of the dark faction. Wins through \
                              numbers, not stats."
                    .into(),
                tags: strings(&["melee", "swarm"]),
                aliases: strings(&[]),
            }),
        )
        .tags(strings(&["melee", "swarm"]))
        .context_tags(strings(&["overwhelming with cheap bodies"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "unit_catapult",
            KnowledgeSource::Static,
            KnowledgeContent::Unit(Unit {
                name: "Catapult".into(),
                faction: Faction::Dark,
                category: "siege".into(),
                tier: 3,
                cost: costs(&[("gold", 300), ("wood", 120)]),
                stats: stats(&[("attack", 60.0), ("defense", 4.0), ("range", 9.0)]),
                counters: strings(&["building_barracks"]),
                countered_by: strings(&["unit_knight"]),
                build_time: 55,
                description: "Long-range siege engine. Deletes buildings, dies to any \
                              cavalry that reaches it."
                    .into(),
                tags: strings(&["siege"]),
                aliases: strings(&["cata"]),
            }),
        )
        .tags(strings(&["siege"]))
        .context_tags(strings(&["breaking fortified bases"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "building_barracks",
            KnowledgeSource::Static,
            KnowledgeContent::Building(Building {
                name: "Barracks".into(),
                faction: Faction::Light,
                category: "military".into(),
                max_level: 5,
                effects: [
                    (1u32, "Trains tier 1 infantry".to_string()),
                    (3, "Unlocks Knight".to_string()),
                    (5, "Training speed +20%".to_string()),
                ]
                .into_iter()
                .collect(),
                upgrade_cost: [
                    (2u32, costs(&[("gold", 200), ("wood", 100)])),
                    (3, costs(&[("gold", 400), ("wood", 250)])),
                ]
                .into_iter()
                .collect(),
                description: "Core military production building. Every army path starts \
                              here."
                    .into(),
                tags: strings(&["military", "production"]),
                aliases: strings(&["barracks"]),
            }),
        )
        .tags(strings(&["military", "production"]))
        .context_tags(strings(&["what to build first"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "strategy_archer_rush",
            KnowledgeSource::Static,
            KnowledgeContent::Strategy(Strategy {
                name: "Archer Rush".into(),
                category: "rush".into(),
                difficulty: "beginner".into(),
                timing_windows: vec![
                    TimingWindow { time: "0:00".into(), action: "Barracks, then range".into() },
                    TimingWindow { time: "2:30".into(), action: "First 6 archers hit".into() },
                    TimingWindow { time: "4:00".into(), action: "Commit or transition".into() },
                ],
                unit_composition: [("unit_archer".to_string(), 12u32), ("unit_swordsman".to_string(), 4)]
                    .into_iter()
                    .collect(),
                counters: strings(&["strategy_turtle_boom"]),
                strong_against: strings(&["greedy economy openings"]),
                description: "All-in early pressure with massed archers behind a thin \
                              melee screen."
                    .into(),
                tips: strings(&["Stop producing workers while committing"]),
                tags: strings(&["aggressive", "rush"]),
                aliases: strings(&["bow rush"]),
            }),
        )
        .tags(strings(&["aggressive"]))
        .context_tags(strings(&["early aggression"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "strategy_turtle_boom",
            KnowledgeSource::Static,
            KnowledgeContent::Strategy(Strategy {
                name: "Turtle Boom".into(),
                category: "boom".into(),
                difficulty: "intermediate".into(),
                timing_windows: vec![
                    TimingWindow { time: "0:00".into(), action: "Walls and towers first".into() },
                    TimingWindow { time: "6:00".into(), action: "Economy fully saturated".into() },
                ],
                unit_composition: [("unit_swordsman".to_string(), 8u32), ("unit_catapult".to_string(), 3)]
                    .into_iter()
                    .collect(),
                counters: strings(&["strategy_archer_rush"]),
                strong_against: strings(&["all-in rushes"]),
                description: "Defend behind fortifications, out-produce the opponent, \
                              then break them with siege."
                    .into(),
                tips: strings(&["Scout for siege before leaving your walls"]),
                tags: strings(&["defensive", "economy"]),
                aliases: strings(&["turtle"]),
            }),
        )
        .tags(strings(&["defensive", "economy"]))
        .context_tags(strings(&["surviving early pressure", "late game power"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "mechanic_counter_system",
            KnowledgeSource::Static,
            KnowledgeContent::Mechanic(Mechanic {
                name: "Counter system".into(),
                category: "combat".into(),
                description: "Damage is multiplied when a unit attacks a class it \
                              counters: cavalry over ranged, ranged over swarms, \
                              infantry over cavalry."
                    .into(),
                formula: Some("damage = attack * counter_multiplier - defense".into()),
                examples: strings(&["Knights deal 1.5x damage to archers"]),
                tips: strings(&["Mixed armies blunt every counter"]),
                tags: strings(&["counters", "combat"]),
                aliases: strings(&["counters"]),
            }),
        )
        .tags(strings(&["counters", "combat"]))
        .context_tags(strings(&["which unit beats which"])),
    );

    entries.push(
        KnowledgeEntry::new(
            "general_ladder_rating",
            KnowledgeSource::Static,
            KnowledgeContent::General(General {
                title: "Ladder rating".into(),
                description: "1v1 and 2v2 ratings are tracked separately; only ranked \
                              queues move them. Decay starts after 14 idle days."
                    .into(),
                aliases: strings(&["elo", "rank"]),
                tags: strings(&["rating", "pvp"]),
                details: BTreeMap::new(),
            }),
        )
        .tags(strings(&["rating", "pvp"]))
        .context_tags(strings(&["how ranking works"])),
    );

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_ids_are_unique_and_prefixed() {
        let entries = seed_entries();
        let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());

        for entry in &entries {
            let prefix = format!("{}_", entry.kind.as_str());
            let expected = match entry.kind.as_str() {
                "mechanics" => "mechanic_".to_string(),
                _ => prefix,
            };
            assert!(
                entry.id.starts_with(&expected),
                "seed id '{}' does not match its type prefix",
                entry.id
            );
        }
    }

    #[test]
    fn test_seeds_are_valid_static_entries() {
        for entry in seed_entries() {
            entry.validate().expect("seed entry must validate");
            assert_eq!(entry.source, KnowledgeSource::Static);
            assert_eq!(entry.confidence, 1.0);
        }
    }
}
