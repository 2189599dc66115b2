//! HTTP surface.
//!
//! Axum routers for the billing webhook, admin entitlement tools, the join
//! flow and tenant content management. Successful responses use the
//! `{success, data}` wrapper; failures render through `KeelsonError`.

pub mod extract;
pub mod response;
mod routes;
pub mod state;

pub use extract::{AdminCaller, Caller, JsonBody, tenant_of};
pub use response::{ApiResponse, ApiResult, CreatedResponse, Deleted, WebhookAck};
pub use routes::router;
pub use state::AppState;
