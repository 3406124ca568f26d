//! Audit trail rows.
//!
//! A [`PendingHistory`] is what a mutation produces; the store turns it into a
//! [`History`] by assigning an id and a write timestamp. Constructors are the
//! only way to build a pending row, so the snapshot shape always matches the
//! action: `create` has no old state, `delete` has no new state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, HistoryId, ItemId};

use crate::item::Item;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
        }
    }
}

impl core::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for HistoryAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(HistoryAction::Create),
            "update" => Ok(HistoryAction::Update),
            "delete" => Ok(HistoryAction::Delete),
            other => Err(DomainError::validation(format!(
                "unknown history action '{other}'"
            ))),
        }
    }
}

/// A history row not yet written (no id, no timestamp).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHistory {
    item_id: ItemId,
    action: HistoryAction,
    changed_by: String,
    old_data: Option<Item>,
    new_data: Option<Item>,
}

impl PendingHistory {
    pub fn created(item: &Item, actor: &str) -> Self {
        Self {
            item_id: item.id,
            action: HistoryAction::Create,
            changed_by: actor.to_string(),
            old_data: None,
            new_data: Some(item.clone()),
        }
    }

    pub fn updated(before: &Item, after: &Item, actor: &str) -> Self {
        Self {
            item_id: after.id,
            action: HistoryAction::Update,
            changed_by: actor.to_string(),
            old_data: Some(before.clone()),
            new_data: Some(after.clone()),
        }
    }

    pub fn deleted(before: &Item, actor: &str) -> Self {
        Self {
            item_id: before.id,
            action: HistoryAction::Delete,
            changed_by: actor.to_string(),
            old_data: Some(before.clone()),
            new_data: None,
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn action(&self) -> HistoryAction {
        self.action
    }

    pub fn changed_by(&self) -> &str {
        &self.changed_by
    }

    pub fn old_data(&self) -> Option<&Item> {
        self.old_data.as_ref()
    }

    pub fn new_data(&self) -> Option<&Item> {
        self.new_data.as_ref()
    }

    /// Attach the store-assigned identity and write time.
    pub fn into_recorded(self, id: HistoryId, timestamp: DateTime<Utc>) -> History {
        History {
            id,
            item_id: self.item_id,
            action: self.action,
            changed_by: self.changed_by,
            timestamp,
            old_data: self.old_data,
            new_data: self.new_data,
        }
    }
}

/// A written, immutable history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub id: HistoryId,
    pub item_id: ItemId,
    pub action: HistoryAction,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
    pub old_data: Option<Item>,
    pub new_data: Option<Item>,
}

/// Sort rows newest first (timestamp desc, then id desc for equal stamps).
pub fn newest_first(rows: &mut [History]) {
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}
