use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use compute::attendance::{self, AttendanceEntry};
use model::entities::attendance::{self as attendance_entity, AttendanceStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::handlers::settings::current_settings;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ScanRequest {
    pub meeting_id: i32,
    /// Token decoded from the QR image
    #[validate(length(min = 1, max = 100))]
    pub qr_code: String,
}

/// Manual attendance entry
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RecordAttendanceRequest {
    pub meeting_id: i32,
    pub parent_id: i32,
    pub status: AttendanceStatus,
    /// Arrival time for PRESENT entries; defaults to now
    pub checked_in_at: Option<NaiveDateTime>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceListQuery {
    pub meeting_id: Option<i32>,
    /// Admins only; parents always see their own rows
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceResponse {
    pub id: i32,
    pub meeting_id: i32,
    pub parent_id: i32,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub late_minutes: i32,
    pub has_penalty: bool,
    pub penalty_amount: Decimal,
    pub penalty_applied: bool,
    pub scanned_via_qr: bool,
    pub qr_scanned_at: Option<NaiveDateTime>,
    pub checked_in_at: Option<NaiveDateTime>,
    pub remarks: Option<String>,
    pub recorded_by: Option<i32>,
}

impl From<attendance_entity::Model> for AttendanceResponse {
    fn from(model: attendance_entity::Model) -> Self {
        Self {
            id: model.id,
            meeting_id: model.meeting_id,
            parent_id: model.parent_id,
            status: model.status,
            is_late: model.is_late,
            late_minutes: model.late_minutes,
            has_penalty: model.has_penalty,
            penalty_amount: model.penalty_amount,
            penalty_applied: model.penalty_applied,
            scanned_via_qr: model.scanned_via_qr,
            qr_scanned_at: model.qr_scanned_at,
            checked_in_at: model.checked_in_at,
            remarks: model.remarks,
            recorded_by: model.recorded_by,
        }
    }
}

/// Check in to a meeting by scanning its QR code
#[utoipa::path(
    post,
    path = "/api/v1/attendance/scan",
    tag = "attendance",
    request_body = ScanRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Checked in", body = ApiResponse<AttendanceResponse>),
        (status = 400, description = "Invalid or expired QR code, closed window, or already recorded", body = ErrorResponse),
        (status = 403, description = "Only parents can check in", body = ErrorResponse),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(parent_id = auth.id(), meeting_id = request.meeting_id))]
pub async fn scan_qr_code(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ScanRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AttendanceResponse>>)> {
    if auth.is_admin() {
        return Err(ApiError::Forbidden("Only parents can check in".to_string()));
    }
    request.validate()?;
    let settings = current_settings(&state).await?;

    let row = attendance::check_in_with_qr(
        &state.db,
        request.meeting_id,
        request.qr_code.trim(),
        auth.id(),
        &settings,
        now(),
    )
    .await?;

    let message = if row.is_late {
        format!("Checked in {} minutes late", row.late_minutes)
    } else {
        "Checked in successfully".to_string()
    };
    info!("Parent {} checked in to meeting {}", auth.id(), request.meeting_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AttendanceResponse::from(row), message)),
    ))
}

/// Record or correct attendance manually
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    tag = "attendance",
    request_body = RecordAttendanceRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attendance recorded", body = ApiResponse<AttendanceResponse>),
        (status = 400, description = "Meeting cancelled or already finalized", body = ErrorResponse),
        (status = 404, description = "Meeting or parent not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn record_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RecordAttendanceRequest>,
) -> ApiResult<Json<ApiResponse<AttendanceResponse>>> {
    auth.require_admin()?;
    request.validate()?;
    let settings = current_settings(&state).await?;

    let entry = AttendanceEntry {
        meeting_id: request.meeting_id,
        parent_id: request.parent_id,
        status: request.status,
        checked_in_at: request.checked_in_at,
        remarks: request.remarks,
        recorded_by: Some(auth.id()),
    };
    let row = attendance::record_attendance(&state.db, entry, &settings, now()).await?;

    info!(
        "Attendance of parent {} at meeting {} set to {:?} by {}",
        row.parent_id,
        row.meeting_id,
        row.status,
        auth.id()
    );
    Ok(Json(ApiResponse::ok(
        AttendanceResponse::from(row),
        "Attendance recorded successfully",
    )))
}

/// List attendance rows
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    tag = "attendance",
    params(AttendanceListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attendance retrieved", body = ApiResponse<Vec<AttendanceResponse>>),
        (status = 403, description = "Not allowed to view these rows", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AttendanceListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<AttendanceResponse>>>> {
    let parent_id = auth.scope_parent(query.parent_id)?;
    let rows = attendance::list_attendance(&state.db, query.meeting_id, parent_id).await?;
    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(AttendanceResponse::from).collect(),
        "Attendance retrieved successfully",
    )))
}
