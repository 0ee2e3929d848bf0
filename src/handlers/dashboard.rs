use axum::{
    extract::{Path, State},
    response::Json,
};
use common::{DashboardSummary, OverdueScanSummary, ParentBalanceSummary};
use compute::dashboard;
use model::entities::user;
use sea_orm::EntityTrait;
use tracing::{info, instrument};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Association-wide figures
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard summary", body = ApiResponse<DashboardSummary>),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<DashboardSummary>>> {
    auth.require_admin()?;
    let summary = dashboard::admin_summary(&state.db, now()).await?;
    Ok(Json(ApiResponse::ok(summary, "Dashboard retrieved successfully")))
}

/// Balances and attendance of the logged-in parent
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/me",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own balance summary", body = ApiResponse<ParentBalanceSummary>)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_my_summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ParentBalanceSummary>>> {
    let summary = dashboard::parent_summary(&state.db, auth.id()).await?;
    Ok(Json(ApiResponse::ok(summary, "Summary retrieved successfully")))
}

/// Balances and attendance of a parent
#[utoipa::path(
    get,
    path = "/api/v1/parents/{parent_id}/summary",
    tag = "dashboard",
    params(("parent_id" = i32, Path, description = "Parent user ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Parent balance summary", body = ApiResponse<ParentBalanceSummary>),
        (status = 403, description = "Not allowed to view this parent", body = ErrorResponse),
        (status = 404, description = "Parent not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_parent_summary(
    Path(parent_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ParentBalanceSummary>>> {
    auth.ensure_can_view_parent(parent_id)?;
    user::Entity::find_by_id(parent_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Parent", parent_id))?;
    let summary = dashboard::parent_summary(&state.db, parent_id).await?;
    Ok(Json(ApiResponse::ok(summary, "Summary retrieved successfully")))
}

/// Flag penalties and contributions past their due date
#[utoipa::path(
    post,
    path = "/api/v1/overdue/scan",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue scan finished", body = ApiResponse<OverdueScanSummary>),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn scan_overdue(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<OverdueScanSummary>>> {
    auth.require_admin()?;
    let timestamp = now();
    let summary = compute::mark_overdue(&state.db, timestamp.date(), timestamp).await?;
    info!(
        "Overdue scan by {}: {} penalties, {} contributions",
        auth.id(),
        summary.penalties_marked,
        summary.contributions_marked
    );
    Ok(Json(ApiResponse::ok(summary, "Overdue scan completed")))
}
