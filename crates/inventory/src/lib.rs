//! Inventory domain module.
//!
//! Items and their append-only audit trail, as plain data plus the rules that
//! keep them well-formed (no IO, no HTTP, no storage).

pub mod history;
pub mod item;

pub use history::{newest_first, History, HistoryAction, PendingHistory};
pub use item::{Item, ItemDraft};
