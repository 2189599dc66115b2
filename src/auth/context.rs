//! Explicit per-request caller identity.

use serde::{Deserialize, Serialize};

/// Role names that grant tenant administration.
pub const ADMIN_ROLES: &[&str] = &["org:admin", "admin"];

/// Role given to users who join an organization through the join flow.
pub const MEMBER_ROLE: &str = "org:member";

/// Kind of credential the caller presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[default]
    SessionToken,
    ApiKey,
    MachineToken,
}

/// Verified identity of the caller, passed explicitly into core operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: String,
    /// Active organization (tenant), if the session has one selected.
    pub org_id: Option<String>,
    pub org_role: Option<String>,
    #[serde(default)]
    pub token_type: TokenType,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: None,
            org_role: None,
            token_type: TokenType::default(),
        }
    }

    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>, org_role: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self.org_role = Some(org_role.into());
        self
    }

    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.org_role
            .as_deref()
            .is_some_and(|role| ADMIN_ROLES.contains(&role))
    }
}
