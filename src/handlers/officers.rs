use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use model::entities::{officer, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfficerResponse {
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    pub position: String,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<officer::Model> for OfficerResponse {
    fn from(model: officer::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            position: model.position,
            term_start: model.term_start,
            term_end: model.term_end,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateOfficerRequest {
    /// Account of the officer, when they have one
    pub user_id: Option<i32>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub position: String,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateOfficerRequest {
    pub user_id: Option<i32>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub position: Option<String>,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OfficerListQuery {
    /// Only officers currently serving
    pub active_only: Option<bool>,
}

fn check_term(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ApiResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ApiError::BadRequest(
                "Term end cannot be before term start".to_string(),
            ));
        }
    }
    Ok(())
}

async fn ensure_user(state: &AppState, user_id: Option<i32>) -> ApiResult<()> {
    if let Some(user_id) = user_id {
        user::Entity::find_by_id(user_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("User", user_id))?;
    }
    Ok(())
}

async fn find_officer(state: &AppState, officer_id: i32) -> ApiResult<officer::Model> {
    officer::Entity::find_by_id(officer_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Officer", officer_id))
}

/// Add an officer
#[utoipa::path(
    post,
    path = "/api/v1/officers",
    tag = "officers",
    request_body = CreateOfficerRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Officer added", body = ApiResponse<OfficerResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Linked user not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_officer(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateOfficerRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<OfficerResponse>>)> {
    auth.require_admin()?;
    request.validate()?;
    check_term(request.term_start, request.term_end)?;
    ensure_user(&state, request.user_id).await?;

    let timestamp = now();
    let created = officer::ActiveModel {
        user_id: Set(request.user_id),
        name: Set(request.name.trim().to_string()),
        position: Set(request.position.trim().to_string()),
        term_start: Set(request.term_start),
        term_end: Set(request.term_end),
        is_active: Set(true),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Officer {} added as {}", created.id, created.position);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            OfficerResponse::from(created),
            "Officer added successfully",
        )),
    ))
}

/// List officers
#[utoipa::path(
    get,
    path = "/api/v1/officers",
    tag = "officers",
    params(OfficerListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Officers retrieved", body = ApiResponse<Vec<OfficerResponse>>)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_officers(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<OfficerListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<OfficerResponse>>>> {
    let mut select = officer::Entity::find();
    if query.active_only.unwrap_or(false) {
        select = select.filter(officer::Column::IsActive.eq(true));
    }
    let officers = select
        .order_by_asc(officer::Column::Position)
        .order_by_asc(officer::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(
        officers.into_iter().map(OfficerResponse::from).collect(),
        "Officers retrieved successfully",
    )))
}

/// Get an officer by ID
#[utoipa::path(
    get,
    path = "/api/v1/officers/{officer_id}",
    tag = "officers",
    params(("officer_id" = i32, Path, description = "Officer ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Officer retrieved", body = ApiResponse<OfficerResponse>),
        (status = 404, description = "Officer not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_officer(
    Path(officer_id): Path<i32>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<OfficerResponse>>> {
    let row = find_officer(&state, officer_id).await?;
    Ok(Json(ApiResponse::ok(
        OfficerResponse::from(row),
        "Officer retrieved successfully",
    )))
}

/// Update an officer
#[utoipa::path(
    put,
    path = "/api/v1/officers/{officer_id}",
    tag = "officers",
    params(("officer_id" = i32, Path, description = "Officer ID")),
    request_body = UpdateOfficerRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Officer updated", body = ApiResponse<OfficerResponse>),
        (status = 400, description = "Invalid term", body = ErrorResponse),
        (status = 404, description = "Officer not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_officer(
    Path(officer_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateOfficerRequest>,
) -> ApiResult<Json<ApiResponse<OfficerResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let existing = find_officer(&state, officer_id).await?;
    check_term(
        request.term_start.or(existing.term_start),
        request.term_end.or(existing.term_end),
    )?;
    ensure_user(&state, request.user_id).await?;

    let mut active: officer::ActiveModel = existing.into();
    if let Some(user_id) = request.user_id {
        active.user_id = Set(Some(user_id));
    }
    if let Some(name) = request.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(position) = request.position {
        active.position = Set(position.trim().to_string());
    }
    if let Some(term_start) = request.term_start {
        active.term_start = Set(Some(term_start));
    }
    if let Some(term_end) = request.term_end {
        active.term_end = Set(Some(term_end));
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(now());

    let updated = active.update(&state.db).await?;
    info!("Officer {} updated", officer_id);
    Ok(Json(ApiResponse::ok(
        OfficerResponse::from(updated),
        "Officer updated successfully",
    )))
}

/// Remove an officer
#[utoipa::path(
    delete,
    path = "/api/v1/officers/{officer_id}",
    tag = "officers",
    params(("officer_id" = i32, Path, description = "Officer ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Officer removed"),
        (status = 404, description = "Officer not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_officer(
    Path(officer_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    find_officer(&state, officer_id).await?;
    officer::Entity::delete_by_id(officer_id).exec(&state.db).await?;
    info!("Officer {} removed", officer_id);
    Ok(StatusCode::NO_CONTENT)
}
