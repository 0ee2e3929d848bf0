use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use common::{AttendanceSummary, PenaltyRunSummary};
use compute::attendance;
use model::entities::meeting::{self, MeetingStatus};
use model::entities::attendance as attendance_entity;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::handlers::settings::current_settings;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Meeting view. The QR token is only included for administrators.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeetingResponse {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub meeting_date: NaiveDateTime,
    pub location: Option<String>,
    pub status: MeetingStatus,
    pub qr_code: Option<String>,
    pub qr_code_expires_at: Option<NaiveDateTime>,
    pub created_by: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl MeetingResponse {
    fn for_caller(model: meeting::Model, auth: &AuthUser) -> Self {
        let show_qr = auth.is_admin();
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            meeting_date: model.meeting_date,
            location: model.location,
            status: model.status,
            qr_code: model.qr_code.filter(|_| show_qr),
            qr_code_expires_at: model.qr_code_expires_at.filter(|_| show_qr),
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateMeetingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Start of the meeting (UTC)
    pub meeting_date: NaiveDateTime,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateMeetingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub meeting_date: Option<NaiveDateTime>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub status: Option<MeetingStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MeetingListQuery {
    pub status: Option<MeetingStatus>,
    /// Only meetings starting now or later
    pub upcoming: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QrCodeResponse {
    pub meeting_id: i32,
    /// Token to encode into the QR image shown at the venue
    pub qr_code: String,
    pub expires_at: NaiveDateTime,
}

async fn find_meeting(state: &AppState, meeting_id: i32) -> ApiResult<meeting::Model> {
    meeting::Entity::find_by_id(meeting_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting", meeting_id))
}

/// Schedule a meeting
#[utoipa::path(
    post,
    path = "/api/v1/meetings",
    tag = "meetings",
    request_body = CreateMeetingRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Meeting scheduled", body = ApiResponse<MeetingResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_meeting(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateMeetingRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MeetingResponse>>)> {
    trace!("Entering create_meeting function");
    auth.require_admin()?;
    request.validate()?;

    let timestamp = now();
    let created = meeting::ActiveModel {
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        meeting_date: Set(request.meeting_date),
        location: Set(request.location),
        status: Set(MeetingStatus::Scheduled),
        qr_code: Set(None),
        qr_code_expires_at: Set(None),
        created_by: Set(Some(auth.id())),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Meeting {} scheduled for {}", created.id, created.meeting_date);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            MeetingResponse::for_caller(created, &auth),
            "Meeting created successfully",
        )),
    ))
}

/// List meetings
#[utoipa::path(
    get,
    path = "/api/v1/meetings",
    tag = "meetings",
    params(MeetingListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Meetings retrieved", body = ApiResponse<Vec<MeetingResponse>>)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_meetings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MeetingListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<MeetingResponse>>>> {
    let mut select = meeting::Entity::find();
    if let Some(status) = query.status {
        select = select.filter(meeting::Column::Status.eq(status));
    }
    let upcoming = query.upcoming.unwrap_or(false);
    if upcoming {
        select = select
            .filter(meeting::Column::MeetingDate.gte(now()))
            .order_by_asc(meeting::Column::MeetingDate);
    } else {
        select = select.order_by_desc(meeting::Column::MeetingDate);
    }

    let meetings = select.all(&state.db).await?;
    debug!("Retrieved {} meetings (upcoming: {})", meetings.len(), upcoming);
    Ok(Json(ApiResponse::ok(
        meetings
            .into_iter()
            .map(|m| MeetingResponse::for_caller(m, &auth))
            .collect(),
        "Meetings retrieved successfully",
    )))
}

/// Get a meeting by ID
#[utoipa::path(
    get,
    path = "/api/v1/meetings/{meeting_id}",
    tag = "meetings",
    params(("meeting_id" = i32, Path, description = "Meeting ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Meeting retrieved", body = ApiResponse<MeetingResponse>),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_meeting(
    Path(meeting_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<MeetingResponse>>> {
    let meeting = find_meeting(&state, meeting_id).await?;
    Ok(Json(ApiResponse::ok(
        MeetingResponse::for_caller(meeting, &auth),
        "Meeting retrieved successfully",
    )))
}

/// Update or cancel a meeting
#[utoipa::path(
    put,
    path = "/api/v1/meetings/{meeting_id}",
    tag = "meetings",
    params(("meeting_id" = i32, Path, description = "Meeting ID")),
    request_body = UpdateMeetingRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Meeting updated", body = ApiResponse<MeetingResponse>),
        (status = 400, description = "Completed meetings cannot be edited", body = ErrorResponse),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_meeting(
    Path(meeting_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateMeetingRequest>,
) -> ApiResult<Json<ApiResponse<MeetingResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let existing = find_meeting(&state, meeting_id).await?;
    if existing.status == MeetingStatus::Completed {
        return Err(ApiError::BadRequest(
            "Completed meetings cannot be edited".to_string(),
        ));
    }
    if request.status == Some(MeetingStatus::Completed) {
        return Err(ApiError::BadRequest(
            "Finalize the meeting to complete it".to_string(),
        ));
    }

    let mut active: meeting::ActiveModel = existing.into();
    if let Some(title) = request.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = request.description {
        active.description = Set(Some(description));
    }
    if let Some(meeting_date) = request.meeting_date {
        active.meeting_date = Set(meeting_date);
    }
    if let Some(location) = request.location {
        active.location = Set(Some(location));
    }
    if let Some(status) = request.status {
        if status == MeetingStatus::Cancelled {
            active.qr_code = Set(None);
            active.qr_code_expires_at = Set(None);
        }
        active.status = Set(status);
    }
    active.updated_at = Set(now());

    let updated = active.update(&state.db).await?;
    info!("Meeting {} updated ({:?})", updated.id, updated.status);
    Ok(Json(ApiResponse::ok(
        MeetingResponse::for_caller(updated, &auth),
        "Meeting updated successfully",
    )))
}

/// Delete a meeting without attendance
#[utoipa::path(
    delete,
    path = "/api/v1/meetings/{meeting_id}",
    tag = "meetings",
    params(("meeting_id" = i32, Path, description = "Meeting ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Meeting deleted"),
        (status = 400, description = "Meeting has attendance records", body = ErrorResponse),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_meeting(
    Path(meeting_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    find_meeting(&state, meeting_id).await?;

    let recorded = attendance_entity::Entity::find()
        .filter(attendance_entity::Column::MeetingId.eq(meeting_id))
        .count(&state.db)
        .await?;
    if recorded > 0 {
        return Err(ApiError::BadRequest(
            "Cannot delete a meeting with attendance records; cancel it instead".to_string(),
        ));
    }

    meeting::Entity::delete_by_id(meeting_id).exec(&state.db).await?;
    info!("Meeting {} deleted", meeting_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a fresh QR token for a meeting
#[utoipa::path(
    post,
    path = "/api/v1/meetings/{meeting_id}/qr",
    tag = "meetings",
    params(("meeting_id" = i32, Path, description = "Meeting ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "QR token issued", body = ApiResponse<QrCodeResponse>),
        (status = 400, description = "Meeting is cancelled or completed", body = ErrorResponse),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn generate_qr_code(
    Path(meeting_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<QrCodeResponse>>> {
    auth.require_admin()?;
    let settings = current_settings(&state).await?;

    let token = Uuid::new_v4().simple().to_string();
    let meeting = attendance::issue_qr_code(
        &state.db,
        meeting_id,
        token,
        settings.qr_expiry_minutes,
        now(),
    )
    .await?;

    let (qr_code, expires_at) = match (meeting.qr_code, meeting.qr_code_expires_at) {
        (Some(code), Some(expires_at)) => (code, expires_at),
        _ => return Err(ApiError::Internal("QR token was not stored".to_string())),
    };
    Ok(Json(ApiResponse::ok(
        QrCodeResponse {
            meeting_id,
            qr_code,
            expires_at,
        },
        "QR code generated successfully",
    )))
}

/// Record absences and turn pending fines into penalties
#[utoipa::path(
    post,
    path = "/api/v1/meetings/{meeting_id}/finalize",
    tag = "meetings",
    params(("meeting_id" = i32, Path, description = "Meeting ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Penalties applied", body = ApiResponse<PenaltyRunSummary>),
        (status = 400, description = "Meeting is cancelled", body = ErrorResponse),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn finalize_meeting(
    Path(meeting_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<PenaltyRunSummary>>> {
    auth.require_admin()?;
    let settings = current_settings(&state).await?;

    let summary = attendance::apply_meeting_penalties(&state.db, meeting_id, &settings, now()).await?;
    info!(
        "Meeting {} finalized by {}: {} absent, {} penalties",
        meeting_id,
        auth.id(),
        summary.absent_marked,
        summary.penalties_created
    );
    Ok(Json(ApiResponse::ok(summary, "Meeting finalized and penalties applied")))
}

/// Attendance counts of a meeting
#[utoipa::path(
    get,
    path = "/api/v1/meetings/{meeting_id}/attendance-summary",
    tag = "meetings",
    params(("meeting_id" = i32, Path, description = "Meeting ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attendance summary", body = ApiResponse<AttendanceSummary>),
        (status = 404, description = "Meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_attendance_summary(
    Path(meeting_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<AttendanceSummary>>> {
    auth.require_admin()?;
    let summary = attendance::meeting_attendance_summary(&state.db, meeting_id).await?;
    Ok(Json(ApiResponse::ok(summary, "Attendance summary retrieved successfully")))
}
