use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CompareQuery, Comparison, CreatePlanRequest, HistoryEntry, PlanDetail, RestoreRequest,
    RestoreResponse, SelectRequest, SelectResponse,
};
use super::repo_types::MealPlan;
use super::services;
use crate::{error::ApiError, state::AppState, tenant::TenantId};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/clients/:client_id/meal-plans", get(list_history))
        .route("/meal-plans/compare", get(compare_plans))
        .route("/meal-plans/:id", get(get_plan))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/clients/:client_id/meal-plans", post(create_plan))
        .route("/meal-plans/compare/select", post(select_for_compare))
        .route("/meal-plans/:id/restore", post(restore_plan))
        .route("/meal-plans/:id/archive", post(archive_plan))
}

// --- handlers ---

fn log_failure(e: &ApiError, what: &str) {
    if e.status().is_server_error() {
        error!(error = %e, "{what} failed");
    } else {
        warn!(error = %e, "{what} rejected");
    }
}

#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let entries = services::history(state.plans.as_ref(), tenant_id, client_id)
        .await
        .inspect_err(|e| log_failure(e, "list_history"))?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanDetail>, ApiError> {
    let detail = services::detail(state.plans.as_ref(), tenant_id, id)
        .await
        .inspect_err(|e| log_failure(e, "get_plan"))?;
    Ok(Json(detail))
}

#[instrument(skip(state))]
pub async fn compare_plans(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(q): Query<CompareQuery>,
) -> Result<Json<Comparison>, ApiError> {
    let comparison = services::compare(state.plans.as_ref(), tenant_id, q.plan_a, q.plan_b)
        .await
        .inspect_err(|e| log_failure(e, "compare_plans"))?;
    Ok(Json(comparison))
}

#[instrument(skip(state, body))]
pub async fn select_for_compare(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Json(body): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let resp = services::select(state.plans.as_ref(), tenant_id, body)
        .await
        .inspect_err(|e| log_failure(e, "select_for_compare"))?;
    Ok(Json(resp))
}

/// POST /clients/:client_id/meal-plans
/// Stores the editor's plan as the next version; `activate` makes it current.
#[instrument(skip(state, body))]
pub async fn create_plan(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(client_id): Path<Uuid>,
    Json(body): Json<CreatePlanRequest>,
) -> Result<(StatusCode, HeaderMap, Json<MealPlan>), ApiError> {
    let plan = services::save_version(state.plans.as_ref(), tenant_id, client_id, body)
        .await
        .inspect_err(|e| log_failure(e, "create_plan"))?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/meal-plans/{}", plan.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }

    info!(plan_id = %plan.id, %client_id, version = plan.version, active = plan.is_active, "meal plan saved");
    Ok((StatusCode::CREATED, headers, Json(plan)))
}

/// Only an empty body means "no guard"; anything else must parse.
fn parse_restore_body(body: &[u8]) -> Result<RestoreRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RestoreRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("invalid restore body: {e}")))
}

/// POST /meal-plans/:id/restore
/// Body is optional; `expected_active_id` guards against a concurrent swap.
#[instrument(skip(state, body))]
pub async fn restore_plan(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<RestoreResponse>, ApiError> {
    let req = parse_restore_body(&body).inspect_err(|e| log_failure(e, "restore_plan"))?;
    let activation = services::restore(state.plans.as_ref(), tenant_id, id, req.expected_active_id)
        .await
        .inspect_err(|e| log_failure(e, "restore_plan"))?;

    info!(
        plan_id = %activation.activated.id,
        deactivated = ?activation.deactivated,
        "meal plan restored"
    );
    Ok(Json(RestoreResponse {
        activated: activation.activated,
        deactivated: activation.deactivated,
    }))
}

#[instrument(skip(state))]
pub async fn archive_plan(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> Result<Json<MealPlan>, ApiError> {
    let plan = services::archive(state.plans.as_ref(), tenant_id, id)
        .await
        .inspect_err(|e| log_failure(e, "archive_plan"))?;
    info!(plan_id = %plan.id, "meal plan archived");
    Ok(Json(plan))
}
