use axum::{extract::State, response::Json};
use chrono::NaiveDateTime;
use model::entities::settings::{self, SETTINGS_ID};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::schemas::{ApiResponse, AppState, CachedData, ErrorResponse};

const SETTINGS_CACHE_KEY: &str = "settings";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub school_name: String,
    pub absent_penalty_amount: Decimal,
    pub late_penalty_amount: Decimal,
    pub late_threshold_minutes: i32,
    pub qr_expiry_minutes: i32,
    pub penalty_due_days: i32,
    pub default_contribution_amount: Decimal,
    pub updated_at: NaiveDateTime,
}

impl From<settings::Model> for SettingsResponse {
    fn from(model: settings::Model) -> Self {
        Self {
            school_name: model.school_name,
            absent_penalty_amount: model.absent_penalty_amount,
            late_penalty_amount: model.late_penalty_amount,
            late_threshold_minutes: model.late_threshold_minutes,
            qr_expiry_minutes: model.qr_expiry_minutes,
            penalty_due_days: model.penalty_due_days,
            default_contribution_amount: model.default_contribution_amount,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, max = 200))]
    pub school_name: Option<String>,
    pub absent_penalty_amount: Option<Decimal>,
    pub late_penalty_amount: Option<Decimal>,
    #[validate(range(min = 0, max = 1440))]
    pub late_threshold_minutes: Option<i32>,
    #[validate(range(min = 1, max = 1440))]
    pub qr_expiry_minutes: Option<i32>,
    #[validate(range(min = 0, max = 365))]
    pub penalty_due_days: Option<i32>,
    pub default_contribution_amount: Option<Decimal>,
}

fn non_negative(field: &str, value: Option<Decimal>) -> ApiResult<()> {
    match value {
        Some(amount) if amount < Decimal::ZERO => Err(ApiError::Validation(format!(
            "{}: must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

/// The settings row, served from the cache when possible.
pub(crate) async fn current_settings(state: &AppState) -> ApiResult<settings::Model> {
    if let Some(CachedData::Settings(cached)) = state.cache.get(SETTINGS_CACHE_KEY).await {
        debug!("Settings served from cache");
        return Ok(cached);
    }

    let row = settings::Entity::find_by_id(SETTINGS_ID)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            error!("Settings row {} is missing; run the migrations", SETTINGS_ID);
            ApiError::Internal("Settings are not initialized".to_string())
        })?;

    state
        .cache
        .insert(SETTINGS_CACHE_KEY.to_string(), CachedData::Settings(row.clone()))
        .await;
    Ok(row)
}

/// Get system settings
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current settings", body = ApiResponse<SettingsResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_settings(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<SettingsResponse>>> {
    let row = current_settings(&state).await?;
    Ok(Json(ApiResponse::ok(
        SettingsResponse::from(row),
        "Settings retrieved successfully",
    )))
}

/// Update system settings
#[utoipa::path(
    put,
    path = "/api/v1/settings",
    tag = "settings",
    request_body = UpdateSettingsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Settings updated", body = ApiResponse<SettingsResponse>),
        (status = 400, description = "Invalid values", body = ErrorResponse),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<ApiResponse<SettingsResponse>>> {
    auth.require_admin()?;
    request.validate()?;
    non_negative("absent_penalty_amount", request.absent_penalty_amount)?;
    non_negative("late_penalty_amount", request.late_penalty_amount)?;
    non_negative("default_contribution_amount", request.default_contribution_amount)?;

    let existing = current_settings(&state).await?;
    let mut active: settings::ActiveModel = existing.into();
    if let Some(school_name) = request.school_name {
        active.school_name = Set(school_name.trim().to_string());
    }
    if let Some(amount) = request.absent_penalty_amount {
        active.absent_penalty_amount = Set(amount);
    }
    if let Some(amount) = request.late_penalty_amount {
        active.late_penalty_amount = Set(amount);
    }
    if let Some(minutes) = request.late_threshold_minutes {
        active.late_threshold_minutes = Set(minutes);
    }
    if let Some(minutes) = request.qr_expiry_minutes {
        active.qr_expiry_minutes = Set(minutes);
    }
    if let Some(days) = request.penalty_due_days {
        active.penalty_due_days = Set(days);
    }
    if let Some(amount) = request.default_contribution_amount {
        active.default_contribution_amount = Set(amount);
    }
    active.updated_at = Set(now());

    let updated = active.update(&state.db).await?;
    state.cache.invalidate(SETTINGS_CACHE_KEY).await;

    info!("Settings updated by {}", auth.id());
    Ok(Json(ApiResponse::ok(
        SettingsResponse::from(updated),
        "Settings updated successfully",
    )))
}
