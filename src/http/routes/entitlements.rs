use crate::billing::BillingProvider;
use crate::content::ContentStore;
use crate::entitlements::{
    EntitlementRecord, EntitlementStore, EntitlementsPolicy, JoinDecision, JoinResult,
};
use crate::error::KeelsonError;
use crate::http::extract::{AdminCaller, Caller, JsonBody};
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::state::AppState;
use crate::ratelimit::{ClientIp, rate_limit_key};
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::info;

const BACKFILL_ACTION: &str = "entitlements.backfill";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BackfillRequest {
    #[serde(alias = "user_id")]
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrgRequest {
    #[serde(alias = "org_slug")]
    org_slug: String,
}

pub(super) fn routes<S, C, B>() -> Router<AppState<S, C, B>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    Router::new()
        .route("/admin/entitlements/backfill", post(backfill::<S, C, B>))
        .route("/admin/entitlements/{user_id}", get(get_record::<S, C, B>))
        .route("/entitlements/check", post(check::<S, C, B>))
        .route("/entitlements/join", post(join::<S, C, B>))
}

async fn backfill<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    AdminCaller(admin): AdminCaller,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<BackfillRequest>,
) -> ApiResult<EntitlementRecord>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(KeelsonError::validation("userId is required."));
    }

    let tenant = admin.org_id.as_deref().unwrap_or("global");
    state
        .limiter
        .check(&rate_limit_key(tenant, &ip, BACKFILL_ACTION))?;

    let record = state.reconciler.backfill(user_id).await?;
    info!(
        target: "keelson::http",
        admin_id = %admin.user_id,
        user_id = %user_id,
        status = %record.status,
        "Entitlements backfilled"
    );
    Ok(ApiResponse::success(record))
}

/// Users without a stored record read as inactive.
async fn get_record<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    AdminCaller(_admin): AdminCaller,
    Path(user_id): Path<String>,
) -> ApiResult<EntitlementRecord>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let record = state
        .entitlements
        .get(&user_id)
        .await?
        .unwrap_or_else(|| EntitlementRecord::inactive(&user_id));
    Ok(ApiResponse::success(record))
}

async fn check<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
    JsonBody(req): JsonBody<OrgRequest>,
) -> ApiResult<JoinDecision>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let decision = state
        .policy
        .can_join_org(&caller.user_id, &req.org_slug)
        .await?;
    Ok(ApiResponse::success(decision))
}

async fn join<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
    JsonBody(req): JsonBody<OrgRequest>,
) -> ApiResult<JoinResult>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let result = state.join.join(&caller, &req.org_slug).await?;
    Ok(ApiResponse::success(result))
}
