use crate::billing::BillingProvider;
use crate::content::ContentStore;
use crate::entitlements::EntitlementStore;
use crate::error::Result;
use crate::http::response::WebhookAck;
use crate::http::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};

pub(super) fn routes<S, C, B>() -> Router<AppState<S, C, B>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    Router::new().route("/webhooks/billing", post(billing_webhook::<S, C, B>))
}

/// Acknowledges with `{received: true}` once the delivery is reconciled,
/// ignored, or recognised as a duplicate.
async fn billing_webhook<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    state.webhook.handle(&headers, &body).await?;
    Ok(Json(WebhookAck::received()))
}
