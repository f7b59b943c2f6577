//! Domain types for the reelkit pipeline.
//!
//! This module contains the core data structures:
//! - Entry: One manifest row per media item, with tri-state stage flags
//! - Identity: Canonical item ids and base-name sanitizing
//! - Stage: Stage identifiers and the columns each stage owns
//! - Timecode: Clip ranges and the timestamps file format
//! - Events: Progress reports emitted during a run

pub mod entry;
pub mod events;
pub mod identity;
pub mod stage;
pub mod timecode;

// Re-export commonly used types
pub use entry::{Column, Entry, EntryPatch, Flag};
pub use events::{Decision, Outcome, Report};
pub use identity::{sanitize_base_name, IdentityError, ItemId};
pub use stage::StageId;
pub use timecode::{TimeRange, TimestampFile};
