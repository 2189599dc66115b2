//! Identity verification boundary.
//!
//! Session management belongs to the identity provider. The core only asks
//! "who is calling" and turns the answer into 401/403 decisions.

use super::context::CallerContext;
use crate::error::{KeelsonError, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;

/// Verifies an inbound request and returns the caller, if any.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` means unauthenticated. Errors are reserved for verifier
    /// outages and are surfaced as server errors.
    async fn verify(&self, headers: &HeaderMap) -> Result<Option<CallerContext>>;
}

/// Require an authenticated caller.
pub async fn check_auth(verifier: &dyn IdentityVerifier, headers: &HeaderMap) -> Result<CallerContext> {
    verifier
        .verify(headers)
        .await?
        .ok_or_else(|| KeelsonError::unauthorized("Authentication required."))
}

/// Require an authenticated caller holding an admin role in their active organization.
pub async fn check_admin(verifier: &dyn IdentityVerifier, headers: &HeaderMap) -> Result<CallerContext> {
    let ctx = check_auth(verifier, headers).await?;
    if !ctx.is_admin() {
        return Err(KeelsonError::forbidden("Admin access required."));
    }
    Ok(ctx)
}

/// Header-driven identity verifier for testing.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test {
    use super::*;

    pub const USER_HEADER: &str = "x-test-user-id";
    pub const ORG_HEADER: &str = "x-test-org-id";
    pub const ROLE_HEADER: &str = "x-test-org-role";

    /// Trusts identity headers verbatim. Never use outside tests.
    #[derive(Debug, Default, Clone)]
    pub struct HeaderIdentityVerifier;

    #[async_trait]
    impl IdentityVerifier for HeaderIdentityVerifier {
        async fn verify(&self, headers: &HeaderMap) -> Result<Option<CallerContext>> {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .filter(|v| !v.is_empty())
            };

            let Some(user_id) = header(USER_HEADER) else {
                return Ok(None);
            };
            let mut ctx = CallerContext::new(user_id);
            ctx.org_id = header(ORG_HEADER);
            ctx.org_role = header(ROLE_HEADER);
            Ok(Some(ctx))
        }
    }
}
