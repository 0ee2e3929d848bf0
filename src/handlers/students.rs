//! Students and the parent-student links that tie accounts to children.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use model::entities::parent_student::{self, LinkStatus};
use model::entities::student;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::now;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: i32,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: String,
    pub section: Option<String>,
    pub is_active: bool,
}

impl From<student::Model> for StudentResponse {
    fn from(model: student::Model) -> Self {
        Self {
            id: model.id,
            student_number: model.student_number,
            first_name: model.first_name,
            last_name: model.last_name,
            grade_level: model.grade_level,
            section: model.section,
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 30))]
    pub student_number: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 30))]
    pub grade_level: String,
    #[validate(length(max = 30))]
    pub section: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 30))]
    pub student_number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub grade_level: Option<String>,
    #[validate(length(max = 30))]
    pub section: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StudentListQuery {
    pub grade_level: Option<String>,
    pub is_active: Option<bool>,
    /// Matches student number, first or last name
    pub search: Option<String>,
}

/// A parent's request to be linked to a student
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LinkRequest {
    #[validate(length(min = 1, max = 30))]
    pub student_number: String,
    /// e.g. mother, father, guardian
    #[validate(length(min = 1, max = 30))]
    pub relationship: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RejectLinkRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LinkListQuery {
    pub status: Option<LinkStatus>,
    /// Admins only; parents always see their own links
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentLinkResponse {
    pub id: i32,
    pub parent_id: i32,
    pub relationship: String,
    pub status: LinkStatus,
    pub rejection_reason: Option<String>,
    pub requested_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
    pub reviewed_by: Option<i32>,
    pub student: Option<StudentResponse>,
}

impl StudentLinkResponse {
    fn new(link: parent_student::Model, student: Option<student::Model>) -> Self {
        Self {
            id: link.id,
            parent_id: link.parent_id,
            relationship: link.relationship,
            status: link.status,
            rejection_reason: link.rejection_reason,
            requested_at: link.requested_at,
            reviewed_at: link.reviewed_at,
            reviewed_by: link.reviewed_by,
            student: student.map(StudentResponse::from),
        }
    }
}

async fn find_student(state: &AppState, student_id: i32) -> ApiResult<student::Model> {
    student::Entity::find_by_id(student_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Student", student_id))
}

async fn ensure_number_free(
    state: &AppState,
    student_number: &str,
    except_id: Option<i32>,
) -> ApiResult<()> {
    let mut query = student::Entity::find().filter(student::Column::StudentNumber.eq(student_number));
    if let Some(id) = except_id {
        query = query.filter(student::Column::Id.ne(id));
    }
    if query.one(&state.db).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "Student number {} already exists",
            student_number
        )));
    }
    Ok(())
}

/// Create a student
#[utoipa::path(
    post,
    path = "/api/v1/students",
    tag = "students",
    request_body = CreateStudentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Student created", body = ApiResponse<StudentResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Student number already exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_student(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateStudentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<StudentResponse>>)> {
    trace!("Entering create_student function");
    auth.require_admin()?;
    request.validate()?;

    let student_number = request.student_number.trim().to_string();
    ensure_number_free(&state, &student_number, None).await?;

    let timestamp = now();
    let created = student::ActiveModel {
        student_number: Set(student_number),
        first_name: Set(request.first_name.trim().to_string()),
        last_name: Set(request.last_name.trim().to_string()),
        grade_level: Set(request.grade_level.trim().to_string()),
        section: Set(request.section),
        is_active: Set(true),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Student {} created with number {}", created.id, created.student_number);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            StudentResponse::from(created),
            "Student created successfully",
        )),
    ))
}

/// List students
#[utoipa::path(
    get,
    path = "/api/v1/students",
    tag = "students",
    params(StudentListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Students retrieved", body = ApiResponse<Vec<StudentResponse>>),
        (status = 403, description = "Administrator access required", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_students(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StudentListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<StudentResponse>>>> {
    auth.require_admin()?;

    let mut select = student::Entity::find();
    if let Some(grade_level) = query.grade_level {
        select = select.filter(student::Column::GradeLevel.eq(grade_level));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(student::Column::IsActive.eq(is_active));
    }
    if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        let search = search.trim().to_string();
        select = select.filter(
            Condition::any()
                .add(student::Column::StudentNumber.contains(&search))
                .add(student::Column::FirstName.contains(&search))
                .add(student::Column::LastName.contains(&search)),
        );
    }

    let students = select
        .order_by_asc(student::Column::LastName)
        .order_by_asc(student::Column::FirstName)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} students", students.len());

    Ok(Json(ApiResponse::ok(
        students.into_iter().map(StudentResponse::from).collect(),
        "Students retrieved successfully",
    )))
}

/// Get a student by ID
#[utoipa::path(
    get,
    path = "/api/v1/students/{student_id}",
    tag = "students",
    params(("student_id" = i32, Path, description = "Student ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Student retrieved", body = ApiResponse<StudentResponse>),
        (status = 404, description = "Student not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_student(
    Path(student_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<StudentResponse>>> {
    auth.require_admin()?;
    let student = find_student(&state, student_id).await?;
    Ok(Json(ApiResponse::ok(
        StudentResponse::from(student),
        "Student retrieved successfully",
    )))
}

/// Update a student
#[utoipa::path(
    put,
    path = "/api/v1/students/{student_id}",
    tag = "students",
    params(("student_id" = i32, Path, description = "Student ID")),
    request_body = UpdateStudentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Student updated", body = ApiResponse<StudentResponse>),
        (status = 404, description = "Student not found", body = ErrorResponse),
        (status = 409, description = "Student number already exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_student(
    Path(student_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateStudentRequest>,
) -> ApiResult<Json<ApiResponse<StudentResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let existing = find_student(&state, student_id).await?;
    let mut active: student::ActiveModel = existing.into();

    if let Some(student_number) = request.student_number {
        let student_number = student_number.trim().to_string();
        ensure_number_free(&state, &student_number, Some(student_id)).await?;
        active.student_number = Set(student_number);
    }
    if let Some(first_name) = request.first_name {
        active.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = request.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if let Some(grade_level) = request.grade_level {
        active.grade_level = Set(grade_level.trim().to_string());
    }
    if let Some(section) = request.section {
        active.section = Set(Some(section).filter(|s| !s.trim().is_empty()));
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(now());

    let updated = active.update(&state.db).await?;
    info!("Student {} updated", updated.id);
    Ok(Json(ApiResponse::ok(
        StudentResponse::from(updated),
        "Student updated successfully",
    )))
}

/// Delete a student together with its parent links
#[utoipa::path(
    delete,
    path = "/api/v1/students/{student_id}",
    tag = "students",
    params(("student_id" = i32, Path, description = "Student ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "Student not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_student(
    Path(student_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    find_student(&state, student_id).await?;

    let txn = state.db.begin().await?;
    let removed_links = parent_student::Entity::delete_many()
        .filter(parent_student::Column::StudentId.eq(student_id))
        .exec(&txn)
        .await?
        .rows_affected;
    student::Entity::delete_by_id(student_id).exec(&txn).await?;
    txn.commit().await?;

    info!("Student {} deleted along with {} links", student_id, removed_links);
    Ok(StatusCode::NO_CONTENT)
}

/// Request a link to a student by student number
#[utoipa::path(
    post,
    path = "/api/v1/student-links",
    tag = "students",
    request_body = LinkRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Link requested", body = ApiResponse<StudentLinkResponse>),
        (status = 404, description = "No student with this number", body = ErrorResponse),
        (status = 409, description = "Link already pending or approved", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(parent_id = auth.id()))]
pub async fn request_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<LinkRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<StudentLinkResponse>>)> {
    if auth.is_admin() {
        return Err(ApiError::Forbidden(
            "Only parents can request student links".to_string(),
        ));
    }
    request.validate()?;

    let student_number = request.student_number.trim();
    let student = student::Entity::find()
        .filter(student::Column::StudentNumber.eq(student_number))
        .filter(student::Column::IsActive.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No student with number {}", student_number)))?;

    let existing = parent_student::Entity::find()
        .filter(parent_student::Column::ParentId.eq(auth.id()))
        .filter(parent_student::Column::StudentId.eq(student.id))
        .one(&state.db)
        .await?;

    let timestamp = now();
    let link = match existing {
        Some(link) if link.status != LinkStatus::Rejected => {
            return Err(ApiError::Conflict(
                "A link request for this student already exists".to_string(),
            ));
        }
        Some(link) => {
            debug!("Re-opening rejected link {}", link.id);
            let mut active: parent_student::ActiveModel = link.into();
            active.relationship = Set(request.relationship.trim().to_string());
            active.status = Set(LinkStatus::Pending);
            active.rejection_reason = Set(None);
            active.requested_at = Set(timestamp);
            active.reviewed_at = Set(None);
            active.reviewed_by = Set(None);
            active.update(&state.db).await?
        }
        None => {
            parent_student::ActiveModel {
                parent_id: Set(auth.id()),
                student_id: Set(student.id),
                relationship: Set(request.relationship.trim().to_string()),
                status: Set(LinkStatus::Pending),
                rejection_reason: Set(None),
                requested_at: Set(timestamp),
                reviewed_at: Set(None),
                reviewed_by: Set(None),
                ..Default::default()
            }
            .insert(&state.db)
            .await?
        }
    };

    info!("Parent {} requested link {} to student {}", auth.id(), link.id, student.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            StudentLinkResponse::new(link, Some(student)),
            "Link request submitted for approval",
        )),
    ))
}

/// List link requests
#[utoipa::path(
    get,
    path = "/api/v1/student-links",
    tag = "students",
    params(LinkListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Links retrieved", body = ApiResponse<Vec<StudentLinkResponse>>),
        (status = 403, description = "Not allowed to view these links", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_links(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<LinkListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<StudentLinkResponse>>>> {
    let parent_id = auth.scope_parent(query.parent_id)?;

    let mut select = parent_student::Entity::find().find_also_related(student::Entity);
    if let Some(parent_id) = parent_id {
        select = select.filter(parent_student::Column::ParentId.eq(parent_id));
    }
    if let Some(status) = query.status {
        select = select.filter(parent_student::Column::Status.eq(status));
    }

    let links = select
        .order_by_desc(parent_student::Column::RequestedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(
        links
            .into_iter()
            .map(|(link, student)| StudentLinkResponse::new(link, student))
            .collect(),
        "Links retrieved successfully",
    )))
}

async fn review_link(
    state: &AppState,
    auth: &AuthUser,
    link_id: i32,
    approve: bool,
    reason: Option<String>,
) -> ApiResult<StudentLinkResponse> {
    let (link, student) = parent_student::Entity::find_by_id(link_id)
        .find_also_related(student::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Link", link_id))?;

    if link.status != LinkStatus::Pending {
        return Err(ApiError::BadRequest(
            "Only pending links can be reviewed".to_string(),
        ));
    }

    let mut active: parent_student::ActiveModel = link.into();
    active.status = Set(if approve {
        LinkStatus::Approved
    } else {
        LinkStatus::Rejected
    });
    active.rejection_reason = Set(reason);
    active.reviewed_at = Set(Some(now()));
    active.reviewed_by = Set(Some(auth.id()));
    let updated = active.update(&state.db).await?;

    info!("Link {} reviewed by {}: {:?}", link_id, auth.id(), updated.status);
    Ok(StudentLinkResponse::new(updated, student))
}

/// Approve a pending link
#[utoipa::path(
    put,
    path = "/api/v1/student-links/{link_id}/approve",
    tag = "students",
    params(("link_id" = i32, Path, description = "Link ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Link approved", body = ApiResponse<StudentLinkResponse>),
        (status = 400, description = "Link is not pending", body = ErrorResponse),
        (status = 404, description = "Link not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn approve_link(
    Path(link_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<StudentLinkResponse>>> {
    auth.require_admin()?;
    let link = review_link(&state, &auth, link_id, true, None).await?;
    Ok(Json(ApiResponse::ok(link, "Link approved")))
}

/// Reject a pending link
#[utoipa::path(
    put,
    path = "/api/v1/student-links/{link_id}/reject",
    tag = "students",
    params(("link_id" = i32, Path, description = "Link ID")),
    request_body = RejectLinkRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Link rejected", body = ApiResponse<StudentLinkResponse>),
        (status = 400, description = "Link is not pending", body = ErrorResponse),
        (status = 404, description = "Link not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn reject_link(
    Path(link_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RejectLinkRequest>,
) -> ApiResult<Json<ApiResponse<StudentLinkResponse>>> {
    auth.require_admin()?;
    request.validate()?;
    let reason = request.reason.trim().to_string();
    let link = review_link(&state, &auth, link_id, false, Some(reason)).await?;
    Ok(Json(ApiResponse::ok(link, "Link rejected")))
}

/// Students linked (and approved) to a parent
#[utoipa::path(
    get,
    path = "/api/v1/parents/{parent_id}/students",
    tag = "students",
    params(("parent_id" = i32, Path, description = "Parent user ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Linked students", body = ApiResponse<Vec<StudentLinkResponse>>),
        (status = 403, description = "Not allowed to view this parent", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_parent_students(
    Path(parent_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<StudentLinkResponse>>>> {
    auth.ensure_can_view_parent(parent_id)?;

    let links = parent_student::Entity::find()
        .find_also_related(student::Entity)
        .filter(parent_student::Column::ParentId.eq(parent_id))
        .filter(parent_student::Column::Status.eq(LinkStatus::Approved))
        .order_by_asc(parent_student::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(
        links
            .into_iter()
            .map(|(link, student)| StudentLinkResponse::new(link, student))
            .collect(),
        "Linked students retrieved successfully",
    )))
}
