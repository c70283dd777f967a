//! Knowledge data models.

pub mod content;
pub mod entry;
pub mod update;

pub use content::{
    Building, Faction, General, KnowledgeContent, Mechanic, Player, Strategy, TimingWindow, Unit,
};
pub use entry::{EntryPatch, KnowledgeEntry, KnowledgeSource, KnowledgeType};
pub use update::KnowledgeUpdate;
