use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use model::entities::announcement::{self, AnnouncementPriority};
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
use crate::notifications::{send_in_batches, OutgoingEmail};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnnouncementResponse {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub priority: AnnouncementPriority,
    pub is_published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_by: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<announcement::Model> for AnnouncementResponse {
    fn from(model: announcement::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            priority: model.priority,
            is_published: model.is_published,
            published_at: model.published_at,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    pub priority: Option<AnnouncementPriority>,
    /// Publish (and notify parents) right away
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub content: Option<String>,
    pub priority: Option<AnnouncementPriority>,
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct AnnouncementListQuery {
    pub priority: Option<AnnouncementPriority>,
    /// Admins only; parents always get published announcements
    pub published: Option<bool>,
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u64>,
}

async fn find_visible(
    state: &AppState,
    auth: &AuthUser,
    announcement_id: i32,
) -> ApiResult<announcement::Model> {
    announcement::Entity::find_by_id(announcement_id)
        .one(&state.db)
        .await?
        .filter(|a| a.is_published || auth.is_admin())
        .ok_or_else(|| ApiError::not_found("Announcement", announcement_id))
}

/// Emails a published announcement to every active parent in the background.
async fn notify_parents(state: &AppState, published: &announcement::Model) -> ApiResult<()> {
    let parents = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Parent))
        .filter(user::Column::IsActive.eq(true))
        .all(&state.db)
        .await?;

    let subject = format!("[{:?}] {}", published.priority, published.title);
    let emails: Vec<OutgoingEmail> = parents
        .into_iter()
        .map(|parent| OutgoingEmail {
            body: format!("Hello {},\n\n{}", parent.first_name, published.content),
            to: parent.email,
            subject: subject.clone(),
        })
        .collect();
    debug!(
        "Queueing announcement {} for {} parents",
        published.id,
        emails.len()
    );

    let mailer = state.mailer.clone();
    let batch_size = state.config.notification_batch_size;
    let delay = state.config.notification_batch_delay();
    tokio::spawn(async move {
        send_in_batches(mailer, emails, batch_size, delay).await;
    });
    Ok(())
}

/// Create an announcement
#[utoipa::path(
    post,
    path = "/api/v1/announcements",
    tag = "announcements",
    request_body = CreateAnnouncementRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Announcement created", body = ApiResponse<AnnouncementResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_announcement(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateAnnouncementRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AnnouncementResponse>>)> {
    trace!("Entering create_announcement function");
    auth.require_admin()?;
    request.validate()?;

    let timestamp = now();
    let created = announcement::ActiveModel {
        title: Set(request.title.trim().to_string()),
        content: Set(request.content),
        priority: Set(request.priority.unwrap_or(AnnouncementPriority::Normal)),
        is_published: Set(request.publish),
        published_at: Set(request.publish.then_some(timestamp)),
        created_by: Set(Some(auth.id())),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    if created.is_published {
        notify_parents(&state, &created).await?;
    }

    info!("Announcement {} created (published: {})", created.id, created.is_published);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            AnnouncementResponse::from(created),
            "Announcement created successfully",
        )),
    ))
}

/// List announcements
#[utoipa::path(
    get,
    path = "/api/v1/announcements",
    tag = "announcements",
    params(AnnouncementListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcements retrieved", body = ApiResponse<Vec<AnnouncementResponse>>)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_announcements(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Query(query)): Valid<Query<AnnouncementListQuery>>,
) -> ApiResult<Json<ApiResponse<Vec<AnnouncementResponse>>>> {
    let mut select = announcement::Entity::find();
    let published = if auth.is_admin() {
        query.published
    } else {
        Some(true)
    };
    if let Some(published) = published {
        select = select.filter(announcement::Column::IsPublished.eq(published));
    }
    if let Some(priority) = query.priority {
        select = select.filter(announcement::Column::Priority.eq(priority));
    }

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);
    let rows = select
        .order_by_desc(announcement::Column::CreatedAt)
        .order_by_desc(announcement::Column::Id)
        .paginate(&state.db, per_page)
        .fetch_page(page - 1)
        .await?;

    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(AnnouncementResponse::from).collect(),
        "Announcements retrieved successfully",
    )))
}

/// Get an announcement by ID
#[utoipa::path(
    get,
    path = "/api/v1/announcements/{announcement_id}",
    tag = "announcements",
    params(("announcement_id" = i32, Path, description = "Announcement ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcement retrieved", body = ApiResponse<AnnouncementResponse>),
        (status = 404, description = "Announcement not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_announcement(
    Path(announcement_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<AnnouncementResponse>>> {
    let row = find_visible(&state, &auth, announcement_id).await?;
    Ok(Json(ApiResponse::ok(
        AnnouncementResponse::from(row),
        "Announcement retrieved successfully",
    )))
}

/// Update an announcement
#[utoipa::path(
    put,
    path = "/api/v1/announcements/{announcement_id}",
    tag = "announcements",
    params(("announcement_id" = i32, Path, description = "Announcement ID")),
    request_body = UpdateAnnouncementRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcement updated", body = ApiResponse<AnnouncementResponse>),
        (status = 404, description = "Announcement not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_announcement(
    Path(announcement_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> ApiResult<Json<ApiResponse<AnnouncementResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let existing = find_visible(&state, &auth, announcement_id).await?;
    let mut active: announcement::ActiveModel = existing.into();
    if let Some(title) = request.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(content) = request.content {
        active.content = Set(content);
    }
    if let Some(priority) = request.priority {
        active.priority = Set(priority);
    }
    active.updated_at = Set(now());

    let updated = active.update(&state.db).await?;
    info!("Announcement {} updated", announcement_id);
    Ok(Json(ApiResponse::ok(
        AnnouncementResponse::from(updated),
        "Announcement updated successfully",
    )))
}

/// Delete an announcement
#[utoipa::path(
    delete,
    path = "/api/v1/announcements/{announcement_id}",
    tag = "announcements",
    params(("announcement_id" = i32, Path, description = "Announcement ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Announcement deleted"),
        (status = 404, description = "Announcement not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_announcement(
    Path(announcement_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    let result = announcement::Entity::delete_by_id(announcement_id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::not_found("Announcement", announcement_id));
    }
    info!("Announcement {} deleted", announcement_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Publish an announcement and email it to all active parents
#[utoipa::path(
    post,
    path = "/api/v1/announcements/{announcement_id}/publish",
    tag = "announcements",
    params(("announcement_id" = i32, Path, description = "Announcement ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcement published", body = ApiResponse<AnnouncementResponse>),
        (status = 400, description = "Already published", body = ErrorResponse),
        (status = 404, description = "Announcement not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn publish_announcement(
    Path(announcement_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<AnnouncementResponse>>> {
    auth.require_admin()?;

    let existing = find_visible(&state, &auth, announcement_id).await?;
    if existing.is_published {
        return Err(ApiError::BadRequest(
            "Announcement is already published".to_string(),
        ));
    }

    let timestamp = now();
    let mut active: announcement::ActiveModel = existing.into();
    active.is_published = Set(true);
    active.published_at = Set(Some(timestamp));
    active.updated_at = Set(timestamp);
    let published = active.update(&state.db).await?;

    notify_parents(&state, &published).await?;
    info!("Announcement {} published by {}", announcement_id, auth.id());
    Ok(Json(ApiResponse::ok(
        AnnouncementResponse::from(published),
        "Announcement published; parents are being notified",
    )))
}
