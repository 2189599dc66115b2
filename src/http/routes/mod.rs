//! Route groups, composed into one router.

mod content;
mod entitlements;
mod webhooks;

use super::state::AppState;
use crate::billing::BillingProvider;
use crate::content::ContentStore;
use crate::entitlements::EntitlementStore;
use axum::Router;

/// Build the full application router.
///
/// ```rust,ignore
/// let state = AppState::new(&config, records, snapshots, billing, identity)?;
/// let app = keelson::http::router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
/// ```
pub fn router<S, C, B>(state: AppState<S, C, B>) -> Router
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    Router::new()
        .merge(webhooks::routes())
        .merge(entitlements::routes())
        .nest("/content", content::routes())
        .with_state(state)
}
