//! Caller identity.
//!
//! Identity is resolved by an external provider behind [`IdentityVerifier`]
//! and passed explicitly as a [`CallerContext`] into every core operation.

mod context;
mod verifier;

pub use context::{ADMIN_ROLES, CallerContext, MEMBER_ROLE, TokenType};
pub use verifier::{IdentityVerifier, check_admin, check_auth};

#[cfg(any(test, feature = "test-helpers"))]
pub use verifier::test::{HeaderIdentityVerifier, ORG_HEADER, ROLE_HEADER, USER_HEADER};
