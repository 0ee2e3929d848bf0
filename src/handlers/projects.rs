use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use compute::project::{self, ExpenseUpdate, NewExpense, NewProject, ProjectUpdate};
use model::entities::project::{self as project_entity, ProjectStatus};
use model::entities::project_expense;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::now;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub budget: Decimal,
    pub total_expenses: Decimal,
    /// Budget minus expenses
    pub balance: Decimal,
    /// Sum of contribution payments, as of the last recalculation
    pub total_raised: Decimal,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<project_entity::Model> for ProjectResponse {
    fn from(model: project_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            budget: model.budget,
            total_expenses: model.total_expenses,
            balance: model.balance,
            total_raised: model.total_raised,
            status: model.status,
            start_date: model.start_date,
            end_date: model.end_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseResponse {
    pub id: i32,
    pub project_id: i32,
    pub description: String,
    pub category: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub receipt_url: Option<String>,
    pub recorded_by: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl From<project_expense::Model> for ExpenseResponse {
    fn from(model: project_expense::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            description: model.description,
            category: model.category,
            amount: model.amount,
            expense_date: model.expense_date,
            receipt_url: model.receipt_url,
            recorded_by: model.recorded_by,
            created_at: model.created_at,
        }
    }
}

/// An expense together with the project totals it changed
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseLedgerResponse {
    pub expense: ExpenseResponse,
    pub project: ProjectResponse,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub budget: Decimal,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub budget: Option<Decimal>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    #[validate(url)]
    pub receipt_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,
    #[validate(url)]
    pub receipt_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Project created", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ProjectResponse>>)> {
    trace!("Entering create_project function");
    auth.require_admin()?;
    request.validate()?;

    let input = NewProject {
        name: request.name.trim().to_string(),
        description: non_blank(request.description),
        budget: request.budget,
        status: request.status.unwrap_or(ProjectStatus::Planning),
        start_date: request.start_date,
        end_date: request.end_date,
    };
    let created = project::create_project(&state.db, input, now()).await?;

    info!("Project {} created with budget {}", created.id, created.budget);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ProjectResponse::from(created),
            "Project created successfully",
        )),
    ))
}

/// List projects
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    params(ProjectListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Projects retrieved", body = ApiResponse<Vec<ProjectResponse>>)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_projects(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ProjectResponse>>>> {
    let projects = project::list_projects(&state.db, query.status).await?;
    Ok(Json(ApiResponse::ok(
        projects.into_iter().map(ProjectResponse::from).collect(),
        "Projects retrieved successfully",
    )))
}

/// Get a project by ID
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Project retrieved", body = ApiResponse<ProjectResponse>),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_project(
    Path(project_id): Path<i32>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ProjectResponse>>> {
    let row = project::get_project(&state.db, project_id).await?;
    Ok(Json(ApiResponse::ok(
        ProjectResponse::from(row),
        "Project retrieved successfully",
    )))
}

/// Update a project
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Project updated", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Budget below recorded expenses", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_project(
    Path(project_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ApiResponse<ProjectResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let update = ProjectUpdate {
        name: request.name.map(|n| n.trim().to_string()),
        description: request.description.map(|d| non_blank(Some(d))),
        budget: request.budget,
        status: request.status,
        start_date: request.start_date.map(Some),
        end_date: request.end_date.map(Some),
    };
    let updated = project::update_project(&state.db, project_id, update, now()).await?;

    info!("Project {} updated by {}", project_id, auth.id());
    Ok(Json(ApiResponse::ok(
        ProjectResponse::from(updated),
        "Project updated successfully",
    )))
}

/// Delete a project without expenses or contributions
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 400, description = "Project still has expenses or contributions", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_project(
    Path(project_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    project::delete_project(&state.db, project_id).await?;
    info!("Project {} deleted by {}", project_id, auth.id());
    Ok(StatusCode::NO_CONTENT)
}

/// Expenses of a project
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/expenses",
    tag = "projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Expenses retrieved", body = ApiResponse<Vec<ExpenseResponse>>),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_expenses(
    Path(project_id): Path<i32>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<ExpenseResponse>>>> {
    let expenses = project::list_expenses(&state.db, project_id).await?;
    Ok(Json(ApiResponse::ok(
        expenses.into_iter().map(ExpenseResponse::from).collect(),
        "Expenses retrieved successfully",
    )))
}

/// Record an expense against the project budget
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/expenses",
    tag = "projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body = CreateExpenseRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Expense recorded", body = ApiResponse<ExpenseLedgerResponse>),
        (status = 400, description = "Expense exceeds the remaining balance", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn add_expense(
    Path(project_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ExpenseLedgerResponse>>)> {
    auth.require_admin()?;
    request.validate()?;

    let input = NewExpense {
        description: request.description.trim().to_string(),
        category: non_blank(request.category),
        amount: request.amount,
        expense_date: request.expense_date,
        receipt_url: non_blank(request.receipt_url),
        recorded_by: Some(auth.id()),
    };
    let (expense, project) = project::add_expense(&state.db, project_id, input, now()).await?;

    info!(
        "Expense {} of {} added to project {}; balance {}",
        expense.id, expense.amount, project_id, project.balance
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ExpenseLedgerResponse {
                expense: ExpenseResponse::from(expense),
                project: ProjectResponse::from(project),
            },
            "Expense recorded successfully",
        )),
    ))
}

/// Update an expense
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/expenses/{expense_id}",
    tag = "projects",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("expense_id" = i32, Path, description = "Expense ID"),
    ),
    request_body = UpdateExpenseRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Expense updated", body = ApiResponse<ExpenseLedgerResponse>),
        (status = 400, description = "Increase exceeds the remaining balance", body = ErrorResponse),
        (status = 404, description = "Project or expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_expense(
    Path((project_id, expense_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateExpenseRequest>,
) -> ApiResult<Json<ApiResponse<ExpenseLedgerResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let update = ExpenseUpdate {
        description: request.description.map(|d| d.trim().to_string()),
        category: request.category.map(|c| non_blank(Some(c))),
        amount: request.amount,
        expense_date: request.expense_date,
        receipt_url: request.receipt_url.map(|u| non_blank(Some(u))),
    };
    let (expense, project) =
        project::update_expense(&state.db, project_id, expense_id, update, now()).await?;

    info!("Expense {} of project {} updated", expense_id, project_id);
    Ok(Json(ApiResponse::ok(
        ExpenseLedgerResponse {
            expense: ExpenseResponse::from(expense),
            project: ProjectResponse::from(project),
        },
        "Expense updated successfully",
    )))
}

/// Delete an expense and give its amount back to the project balance
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/expenses/{expense_id}",
    tag = "projects",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("expense_id" = i32, Path, description = "Expense ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Expense deleted", body = ApiResponse<ProjectResponse>),
        (status = 404, description = "Project or expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_expense(
    Path((project_id, expense_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ProjectResponse>>> {
    auth.require_admin()?;
    let project = project::delete_expense(&state.db, project_id, expense_id, now()).await?;

    info!("Expense {} of project {} deleted", expense_id, project_id);
    Ok(Json(ApiResponse::ok(
        ProjectResponse::from(project),
        "Expense deleted successfully",
    )))
}

/// Recompute expenses, balance and amount raised from the ledger rows
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/recalculate",
    tag = "projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Totals recalculated", body = ApiResponse<ProjectResponse>),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn recalculate_totals(
    Path(project_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ProjectResponse>>> {
    auth.require_admin()?;
    let project = project::recalculate_project_totals(&state.db, project_id, now()).await?;

    info!(
        "Project {} totals recalculated: raised {}, expenses {}",
        project_id, project.total_raised, project.total_expenses
    );
    Ok(Json(ApiResponse::ok(
        ProjectResponse::from(project),
        "Project totals recalculated",
    )))
}
