//! Request extractors with `KeelsonError` rejections.

use crate::auth::{CallerContext, IdentityVerifier, check_admin, check_auth};
use crate::error::KeelsonError;
use axum::Json;
use axum::extract::{FromRef, FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// JSON body extractor whose rejection is a 400 validation error.
///
/// # Example
///
/// ```rust,ignore
/// async fn create(JsonBody(input): JsonBody<ContentTypeInput>) -> ApiResult<ContentType> {
///     // ...
/// }
/// ```
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = KeelsonError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| KeelsonError::validation(format!("Invalid JSON: {}", e.body_text())))?;
        Ok(JsonBody(value))
    }
}

/// Any authenticated caller. Rejects with 401.
pub struct Caller(pub CallerContext);

impl<S> FromRequestParts<S> for Caller
where
    Arc<dyn IdentityVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = KeelsonError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<dyn IdentityVerifier>::from_ref(state);
        Ok(Caller(check_auth(verifier.as_ref(), &parts.headers).await?))
    }
}

/// An authenticated caller with an admin role. Rejects with 401 or 403.
pub struct AdminCaller(pub CallerContext);

impl<S> FromRequestParts<S> for AdminCaller
where
    Arc<dyn IdentityVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = KeelsonError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<dyn IdentityVerifier>::from_ref(state);
        Ok(AdminCaller(check_admin(verifier.as_ref(), &parts.headers).await?))
    }
}

/// The tenant a caller acts for: their active organization.
pub fn tenant_of(caller: &CallerContext) -> Result<&str, KeelsonError> {
    caller
        .org_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| KeelsonError::forbidden("An active organization is required."))
}
