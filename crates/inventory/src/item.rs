use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult, ItemId};

/// A stored inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub count: i64,
}

/// Client-supplied item fields for create/update.
///
/// Any `id` in the request body is ignored; the store assigns identities and
/// updates take the id from the path. Missing fields default to empty/zero
/// and are then rejected by [`ItemDraft::validate`] where that matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>, count: i64) -> DomainResult<Self> {
        let draft = Self {
            name: name.into(),
            count,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Structural checks only. A negative count is a business rule left to
    /// callers.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(())
    }

    /// Materialize the draft under a store-assigned id.
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            count: self.count,
        }
    }
}
