//! File-based memory subsystems: each one a flat-file SSOT with its own
//! manager, mirroring original_source's `memory/` and `parsers/` packages.

pub mod bible;
pub mod character;
pub mod episodic;
pub mod fact;
pub mod foreshadowing;

pub use bible::{Bible, BibleLoader, BibleParser};
pub use character::{CharacterCard, CharacterFormatter, CharacterLoader};
pub use episodic::{EpisodicMemoryManager, SimpleSummarizer};
pub use fact::{Fact, FactsManager};
pub use foreshadowing::{Foreshadowing, ForeshadowingManager, ForeshadowingStatus, Priority};
