//! Typed knowledge payloads.
//!
//! The payload is a closed union: one variant per entry type. The
//! store persists it as an opaque JSON blob and the variant is
//! re-selected from the entry's type column on read. Meta, timing and
//! general entries share the free-form [`General`] shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entry::KnowledgeType;

/// The two playable factions of War Legends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Dark,
    Light,
}

impl Default for Faction {
    fn default() -> Self {
        Self::Light
    }
}

/// A combat unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,

    #[serde(default)]
    pub faction: Faction,

    /// infantry, cavalry, ranged, siege, ...
    pub category: String,

    /// Tech tier, starting at 1.
    pub tier: u32,

    /// Resource -> amount to train.
    #[serde(default)]
    pub cost: BTreeMap<String, i64>,

    /// Stat name -> value (attack, defense, speed, ...).
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,

    /// Unit ids this unit is strong against.
    #[serde(default)]
    pub counters: Vec<String>,

    /// Unit ids this unit is weak against.
    #[serde(default)]
    pub countered_by: Vec<String>,

    /// Training time in seconds.
    #[serde(default)]
    pub build_time: u32,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Community names for the same unit.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A base building.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Building {
    pub name: String,

    #[serde(default)]
    pub faction: Faction,

    /// economic, military, defensive, ...
    pub category: String,

    /// Highest upgrade level.
    pub max_level: u32,

    /// Level -> effect granted at that level.
    #[serde(default)]
    pub effects: BTreeMap<u32, String>,

    /// Level -> resource costs to reach it.
    #[serde(default)]
    pub upgrade_cost: BTreeMap<u32, BTreeMap<String, i64>>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One step of a build order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingWindow {
    /// Game time, e.g. "2:30" or "mid game".
    pub time: String,
    pub action: String,
}

/// A strategy or build order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,

    /// rush, boom, turtle, hybrid, ...
    pub category: String,

    /// beginner, intermediate, advanced.
    pub difficulty: String,

    /// Ordered timing steps.
    #[serde(default)]
    pub timing_windows: Vec<TimingWindow>,

    /// Unit id -> count in the target army.
    #[serde(default)]
    pub unit_composition: BTreeMap<String, u32>,

    /// Strategies that beat this one.
    #[serde(default)]
    pub counters: Vec<String>,

    /// Strategies this one beats.
    #[serde(default)]
    pub strong_against: Vec<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tips: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub aliases: Vec<String>,
}

/// An explanation of a game mechanic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mechanic {
    pub name: String,

    /// combat, economy, progression, ...
    pub category: String,

    pub description: String,

    /// Mathematical formula, when one exists.
    #[serde(default)]
    pub formula: Option<String>,

    #[serde(default)]
    pub examples: Vec<String>,

    #[serde(default)]
    pub tips: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A community player profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Player {
    /// Main in-game nickname.
    pub handle: String,

    #[serde(default)]
    pub rating: Option<i32>,

    #[serde(default)]
    pub rank: Option<String>,

    #[serde(default)]
    pub clan: Option<String>,

    #[serde(default)]
    pub preferred_strategies: Vec<String>,

    /// Free-form observations ("plays rush", "good micro").
    #[serde(default)]
    pub play_style_notes: Vec<String>,

    /// Free-form stats that don't warrant a schema.
    #[serde(default)]
    pub stats: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Free-form knowledge that isn't a unit, building or strategy.
///
/// Also the payload for meta and timing entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct General {
    pub title: String,

    pub description: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Arbitrary extra details.
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Closed union of every payload shape an entry can carry.
#[derive(Debug, Clone)]
pub enum KnowledgeContent {
    Unit(Unit),
    Building(Building),
    Strategy(Strategy),
    Mechanic(Mechanic),
    Player(Player),
    General(General),
}

impl KnowledgeContent {
    /// The entry type this payload naturally belongs to.
    pub fn kind(&self) -> KnowledgeType {
        match self {
            KnowledgeContent::Unit(_) => KnowledgeType::Unit,
            KnowledgeContent::Building(_) => KnowledgeType::Building,
            KnowledgeContent::Strategy(_) => KnowledgeType::Strategy,
            KnowledgeContent::Mechanic(_) => KnowledgeType::Mechanics,
            KnowledgeContent::Player(_) => KnowledgeType::Player,
            KnowledgeContent::General(_) => KnowledgeType::General,
        }
    }

    /// Whether this payload is valid for the given entry type.
    pub fn matches(&self, kind: KnowledgeType) -> bool {
        match self {
            // The free-form shape backs the three loose entry types.
            KnowledgeContent::General(_) => matches!(
                kind,
                KnowledgeType::General | KnowledgeType::Meta | KnowledgeType::Timing
            ),
            other => other.kind() == kind,
        }
    }

    /// Serialize the inner struct as an opaque JSON blob.
    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        match self {
            KnowledgeContent::Unit(v) => serde_json::to_string(v),
            KnowledgeContent::Building(v) => serde_json::to_string(v),
            KnowledgeContent::Strategy(v) => serde_json::to_string(v),
            KnowledgeContent::Mechanic(v) => serde_json::to_string(v),
            KnowledgeContent::Player(v) => serde_json::to_string(v),
            KnowledgeContent::General(v) => serde_json::to_string(v),
        }
    }

    /// Rebuild the payload from the stored type column and JSON blob.
    pub(crate) fn from_parts(kind: KnowledgeType, json: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            KnowledgeType::Unit => KnowledgeContent::Unit(serde_json::from_str(json)?),
            KnowledgeType::Building => KnowledgeContent::Building(serde_json::from_str(json)?),
            KnowledgeType::Strategy => KnowledgeContent::Strategy(serde_json::from_str(json)?),
            KnowledgeType::Mechanics => KnowledgeContent::Mechanic(serde_json::from_str(json)?),
            KnowledgeType::Player => KnowledgeContent::Player(serde_json::from_str(json)?),
            KnowledgeType::Meta | KnowledgeType::Timing | KnowledgeType::General => {
                KnowledgeContent::General(serde_json::from_str(json)?)
            }
        })
    }

    /// Display name of the payload.
    pub fn name(&self) -> &str {
        match self {
            KnowledgeContent::Unit(v) => &v.name,
            KnowledgeContent::Building(v) => &v.name,
            KnowledgeContent::Strategy(v) => &v.name,
            KnowledgeContent::Mechanic(v) => &v.name,
            KnowledgeContent::Player(v) => &v.handle,
            KnowledgeContent::General(v) => &v.title,
        }
    }

    /// Tags declared inside the payload itself.
    pub fn tags(&self) -> &[String] {
        match self {
            KnowledgeContent::Unit(v) => &v.tags,
            KnowledgeContent::Building(v) => &v.tags,
            KnowledgeContent::Strategy(v) => &v.tags,
            KnowledgeContent::Mechanic(v) => &v.tags,
            KnowledgeContent::Player(v) => &v.tags,
            KnowledgeContent::General(v) => &v.tags,
        }
    }

    /// Natural-language fragments fed into the full-text index.
    pub(crate) fn searchable_parts(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = Vec::new();
        match self {
            KnowledgeContent::Unit(v) => {
                parts.push(&v.name);
                parts.push(&v.category);
                parts.push(&v.description);
                parts.extend(v.aliases.iter().map(String::as_str));
            }
            KnowledgeContent::Building(v) => {
                parts.push(&v.name);
                parts.push(&v.category);
                parts.push(&v.description);
                parts.extend(v.aliases.iter().map(String::as_str));
            }
            KnowledgeContent::Strategy(v) => {
                parts.push(&v.name);
                parts.push(&v.category);
                parts.push(&v.description);
                parts.extend(v.tips.iter().map(String::as_str));
                parts.extend(v.aliases.iter().map(String::as_str));
            }
            KnowledgeContent::Mechanic(v) => {
                parts.push(&v.name);
                parts.push(&v.category);
                parts.push(&v.description);
                parts.extend(v.examples.iter().map(String::as_str));
                parts.extend(v.aliases.iter().map(String::as_str));
            }
            KnowledgeContent::Player(v) => {
                parts.push(&v.handle);
                parts.extend(v.preferred_strategies.iter().map(String::as_str));
                parts.extend(v.play_style_notes.iter().map(String::as_str));
            }
            KnowledgeContent::General(v) => {
                parts.push(&v.title);
                parts.push(&v.description);
                parts.extend(v.aliases.iter().map(String::as_str));
            }
        }
        parts.extend(self.tags().iter().map(String::as_str));
        parts
    }

    /// Shape validation applied before a payload reaches the store.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        match self {
            KnowledgeContent::Unit(v) => {
                if v.name.trim().is_empty() {
                    return Err("unit name must not be empty".into());
                }
                if v.tier < 1 {
                    return Err(format!("unit tier must be >= 1, got {}", v.tier));
                }
            }
            KnowledgeContent::Building(v) => {
                if v.name.trim().is_empty() {
                    return Err("building name must not be empty".into());
                }
                if v.max_level < 1 {
                    return Err(format!("building max_level must be >= 1, got {}", v.max_level));
                }
            }
            KnowledgeContent::Strategy(v) => {
                if v.name.trim().is_empty() {
                    return Err("strategy name must not be empty".into());
                }
            }
            KnowledgeContent::Mechanic(v) => {
                if v.name.trim().is_empty() {
                    return Err("mechanic name must not be empty".into());
                }
            }
            KnowledgeContent::Player(v) => {
                if v.handle.trim().is_empty() {
                    return Err("player handle must not be empty".into());
                }
            }
            KnowledgeContent::General(v) => {
                if v.title.trim().is_empty() {
                    return Err("general entry title must not be empty".into());
                }
            }
        }
        Ok(())
    }
}
