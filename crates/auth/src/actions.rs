use serde::Serialize;

use crate::Role;

/// A protected operation, one per authenticated route.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ListItems,
    CreateItem,
    UpdateItem,
    DeleteItem,
    ItemHistory,
    ListHistory,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::ListItems,
        Action::CreateItem,
        Action::UpdateItem,
        Action::DeleteItem,
        Action::ItemHistory,
        Action::ListHistory,
    ];

    /// Explicit allow-list for this action.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Action::ListItems => &[Role::Admin, Role::Manager, Role::Viewer],
            Action::CreateItem => &[Role::Admin, Role::Manager],
            Action::UpdateItem => &[Role::Admin, Role::Manager],
            Action::DeleteItem => &[Role::Admin],
            Action::ItemHistory => &[Role::Admin, Role::Manager, Role::Viewer],
            Action::ListHistory => &[Role::Admin, Role::Manager, Role::Viewer],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ListItems => "list_items",
            Action::CreateItem => "create_item",
            Action::UpdateItem => "update_item",
            Action::DeleteItem => "delete_item",
            Action::ItemHistory => "item_history",
            Action::ListHistory => "list_history",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
