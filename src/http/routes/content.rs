use crate::billing::BillingProvider;
use crate::content::{
    ContentEntry, ContentEntryInput, ContentStore, ContentType, ContentTypeInput, CustomField,
    CustomFieldInput,
};
use crate::entitlements::EntitlementStore;
use crate::error::Result;
use crate::http::extract::{AdminCaller, Caller, JsonBody, tenant_of};
use crate::http::response::{ApiResponse, ApiResult, CreatedResponse, Deleted};
use crate::http::state::AppState;
use crate::ratelimit::{ClientIp, rate_limit_key};
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;

const WRITE_ACTION: &str = "content.write";

pub(super) fn routes<S, C, B>() -> Router<AppState<S, C, B>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    Router::new()
        .route(
            "/types",
            get(list_types::<S, C, B>).post(create_type::<S, C, B>),
        )
        .route(
            "/types/{type_id}",
            get(get_type::<S, C, B>)
                .put(update_type::<S, C, B>)
                .delete(delete_type::<S, C, B>),
        )
        .route(
            "/fields",
            get(list_fields::<S, C, B>).post(create_field::<S, C, B>),
        )
        .route(
            "/fields/{field_id}",
            get(get_field::<S, C, B>)
                .put(update_field::<S, C, B>)
                .delete(delete_field::<S, C, B>),
        )
        .route(
            "/types/{type_id}/entries",
            get(list_entries::<S, C, B>).post(create_entry::<S, C, B>),
        )
        .route(
            "/types/{type_id}/entries/{entry_id}",
            get(get_entry::<S, C, B>)
                .put(update_entry::<S, C, B>)
                .delete(delete_entry::<S, C, B>),
        )
}

/// Resolve the admin's tenant and charge one write against the rate limit.
fn write_tenant<S, C, B>(
    state: &AppState<S, C, B>,
    admin: &AdminCaller,
    ip: &str,
) -> Result<String>
where
    S: EntitlementStore,
    C: ContentStore,
    B: BillingProvider,
{
    let tenant = tenant_of(&admin.0)?;
    state
        .limiter
        .check(&rate_limit_key(tenant, ip, WRITE_ACTION))?;
    Ok(tenant.to_string())
}

// -- content types --------------------------------------------------------

async fn list_types<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
) -> ApiResult<Vec<ContentType>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = tenant_of(&caller)?;
    Ok(ApiResponse::success(state.content.list_content_types(tenant).await?))
}

async fn get_type<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
    Path(type_id): Path<String>,
) -> ApiResult<ContentType>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = tenant_of(&caller)?;
    Ok(ApiResponse::success(
        state.content.get_content_type(tenant, &type_id).await?,
    ))
}

async fn create_type<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    JsonBody(input): JsonBody<ContentTypeInput>,
) -> Result<CreatedResponse<ContentType>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    let created = state.content.create_content_type(&tenant, input).await?;
    Ok(ApiResponse::created(created))
}

async fn update_type<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path(type_id): Path<String>,
    JsonBody(input): JsonBody<ContentTypeInput>,
) -> ApiResult<ContentType>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    Ok(ApiResponse::success(
        state.content.update_content_type(&tenant, &type_id, input).await?,
    ))
}

async fn delete_type<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path(type_id): Path<String>,
) -> ApiResult<Deleted>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    state.content.delete_content_type(&tenant, &type_id).await?;
    Ok(ApiResponse::success(Deleted { id: type_id }))
}

// -- custom fields --------------------------------------------------------

async fn list_fields<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
) -> ApiResult<Vec<CustomField>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = tenant_of(&caller)?;
    Ok(ApiResponse::success(state.content.list_custom_fields(tenant).await?))
}

async fn get_field<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
    Path(field_id): Path<String>,
) -> ApiResult<CustomField>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = tenant_of(&caller)?;
    Ok(ApiResponse::success(
        state.content.get_custom_field(tenant, &field_id).await?,
    ))
}

async fn create_field<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    JsonBody(input): JsonBody<CustomFieldInput>,
) -> Result<CreatedResponse<CustomField>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    let created = state.content.create_custom_field(&tenant, input).await?;
    Ok(ApiResponse::created(created))
}

async fn update_field<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path(field_id): Path<String>,
    JsonBody(input): JsonBody<CustomFieldInput>,
) -> ApiResult<CustomField>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    Ok(ApiResponse::success(
        state.content.update_custom_field(&tenant, &field_id, input).await?,
    ))
}

async fn delete_field<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path(field_id): Path<String>,
) -> ApiResult<Deleted>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    state.content.delete_custom_field(&tenant, &field_id).await?;
    Ok(ApiResponse::success(Deleted { id: field_id }))
}

// -- entries ----------------------------------------------------------------

async fn list_entries<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
    Path(type_id): Path<String>,
) -> ApiResult<Vec<ContentEntry>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = tenant_of(&caller)?;
    Ok(ApiResponse::success(
        state.content.list_entries(tenant, &type_id).await?,
    ))
}

async fn get_entry<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    Caller(caller): Caller,
    Path((type_id, entry_id)): Path<(String, String)>,
) -> ApiResult<ContentEntry>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = tenant_of(&caller)?;
    Ok(ApiResponse::success(
        state.content.get_entry(tenant, &type_id, &entry_id).await?,
    ))
}

async fn create_entry<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path(type_id): Path<String>,
    JsonBody(input): JsonBody<ContentEntryInput>,
) -> Result<CreatedResponse<ContentEntry>>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    let created = state.content.create_entry(&tenant, &type_id, input).await?;
    Ok(ApiResponse::created(created))
}

async fn update_entry<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path((type_id, entry_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<ContentEntryInput>,
) -> ApiResult<ContentEntry>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    Ok(ApiResponse::success(
        state
            .content
            .update_entry(&tenant, &type_id, &entry_id, input)
            .await?,
    ))
}

async fn delete_entry<S, C, B>(
    State(state): State<AppState<S, C, B>>,
    admin: AdminCaller,
    ClientIp(ip): ClientIp,
    Path((type_id, entry_id)): Path<(String, String)>,
) -> ApiResult<Deleted>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    let tenant = write_tenant(&state, &admin, &ip)?;
    state
        .content
        .delete_entry(&tenant, &type_id, &entry_id)
        .await?;
    Ok(ApiResponse::success(Deleted { id: entry_id }))
}
