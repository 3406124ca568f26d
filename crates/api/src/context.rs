use warehouse_auth::{Claims, Role};

/// Principal context for a request (authenticated identity + role).
///
/// Built from validated token claims only; never from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    username: String,
    role: Option<Role>,
}

impl PrincipalContext {
    pub fn new(username: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `None` when the token carried no recognised role.
    pub fn role(&self) -> Option<Role> {
        self.role
    }
}

impl From<Claims> for PrincipalContext {
    fn from(claims: Claims) -> Self {
        Self::new(claims.username, claims.role)
    }
}
