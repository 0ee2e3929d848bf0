use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use model::entities::user::{self, UserRole};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Public view of an account; never carries the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            role: model.role,
            is_active: model.is_active,
            is_verified: model.is_verified,
            created_at: model.created_at,
        }
    }
}

/// Query parameters for the user list
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// 1-based page number
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 200))]
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

async fn find_user(state: &AppState, user_id: i32) -> ApiResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Query(query)): Valid<Query<UserListQuery>>,
) -> ApiResult<Json<ApiResponse<Vec<UserResponse>>>> {
    trace!("Entering get_users function");
    auth.require_admin()?;

    let mut select = user::Entity::find();
    if let Some(role) = query.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(user::Column::IsActive.eq(is_active));
    }

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(50);
    let users = select
        .order_by_asc(user::Column::LastName)
        .order_by_asc(user::Column::FirstName)
        .paginate(&state.db, per_page)
        .fetch_page(page - 1)
        .await?;

    debug!("Retrieved {} users (page {})", users.len(), page);
    Ok(Json(ApiResponse::ok(
        users.into_iter().map(UserResponse::from).collect(),
        "Users retrieved successfully",
    )))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    auth.ensure_can_view_parent(user_id)?;
    let user = find_user(&state, user_id).await?;
    Ok(Json(ApiResponse::ok(
        UserResponse::from(user),
        "User retrieved successfully",
    )))
}

/// Update a user's profile, role or active flag
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    if user_id == auth.id() {
        if request.is_active == Some(false) {
            return Err(ApiError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        if request.role == Some(UserRole::Parent) {
            return Err(ApiError::BadRequest(
                "You cannot remove your own administrator role".to_string(),
            ));
        }
    }

    let existing = find_user(&state, user_id).await?;
    let mut active: user::ActiveModel = existing.into();
    if let Some(first_name) = request.first_name {
        active.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = request.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if let Some(phone) = request.phone {
        let phone = phone.trim().to_string();
        active.phone = Set(if phone.is_empty() { None } else { Some(phone) });
    }
    if let Some(role) = request.role {
        active.role = Set(role);
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(now());

    let updated = active.update(&state.db).await?;
    info!("User {} updated by {}", updated.id, auth.id());
    Ok(Json(ApiResponse::ok(
        UserResponse::from(updated),
        "User updated successfully",
    )))
}

/// Deactivate a user. Accounts are never hard-deleted because money records reference them.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User deactivated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Cannot deactivate own account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn deactivate_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    auth.require_admin()?;
    if user_id == auth.id() {
        return Err(ApiError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let existing = find_user(&state, user_id).await?;
    let mut active: user::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;

    info!("User {} deactivated by {}", user_id, auth.id());
    Ok(Json(ApiResponse::ok(
        UserResponse::from(updated),
        "User deactivated successfully",
    )))
}
