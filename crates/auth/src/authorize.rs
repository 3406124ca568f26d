use thiserror::Error;

use crate::{Action, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: no role")]
    MissingRole,

    #[error("forbidden: role '{role}' may not {action}")]
    Forbidden { role: Role, action: Action },
}

/// Authorize a role for an action.
///
/// - No IO
/// - No panics
/// - Pure set membership against the action's allow-list
///
/// An absent role is never mapped to a default.
pub fn authorize(role: Option<Role>, action: Action) -> Result<(), AuthzError> {
    let role = role.ok_or(AuthzError::MissingRole)?;

    if action.allowed_roles().contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { role, action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_cannot_write() {
        assert_eq!(
            authorize(Some(Role::Viewer), Action::CreateItem),
            Err(AuthzError::Forbidden {
                role: Role::Viewer,
                action: Action::CreateItem
            })
        );
        assert!(authorize(Some(Role::Viewer), Action::UpdateItem).is_err());
        assert!(authorize(Some(Role::Viewer), Action::DeleteItem).is_err());
    }

    #[test]
    fn only_admin_deletes() {
        assert_eq!(authorize(Some(Role::Admin), Action::DeleteItem), Ok(()));
        assert!(authorize(Some(Role::Manager), Action::DeleteItem).is_err());
    }

    #[test]
    fn missing_role_is_always_forbidden() {
        for action in Action::ALL {
            assert_eq!(authorize(None, action), Err(AuthzError::MissingRole));
        }
    }

    #[test]
    fn every_role_reads() {
        for role in Role::ALL {
            assert!(authorize(Some(role), Action::ListItems).is_ok());
            assert!(authorize(Some(role), Action::ItemHistory).is_ok());
            assert!(authorize(Some(role), Action::ListHistory).is_ok());
        }
    }

    #[test]
    fn decision_matches_allow_list_for_every_pair() {
        for action in Action::ALL {
            for role in Role::ALL {
                let listed = action.allowed_roles().contains(&role);
                assert_eq!(authorize(Some(role), action).is_ok(), listed, "{role} / {action}");
            }
        }
    }
}
