use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use compute::balance::PaymentInput;
use compute::contribution::{self, ContributionFilter, ContributionTerms, ContributionUpdate};
use model::entities::contribution as contribution_entity;
use model::entities::payment::PaymentStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::now;
use crate::handlers::settings::current_settings;
use crate::schemas::{
    ApiResponse, AppState, ErrorResponse, PaymentResponse, RecordPaymentRequest, WaiveRequest,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContributionResponse {
    pub id: i32,
    pub parent_id: i32,
    pub project_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub discount_amount: Decimal,
    pub amount_paid: Decimal,
    pub waived_amount: Decimal,
    pub balance: Decimal,
    pub payment_status: PaymentStatus,
    pub is_paid: bool,
    pub is_waived: bool,
    pub waived_reason: Option<String>,
    pub waived_at: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDate>,
    pub is_overdue: bool,
    pub days_overdue: i32,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<contribution_entity::Model> for ContributionResponse {
    fn from(model: contribution_entity::Model) -> Self {
        Self {
            id: model.id,
            parent_id: model.parent_id,
            project_id: model.project_id,
            title: model.title,
            description: model.description,
            amount: model.amount,
            discount_amount: model.discount_amount,
            amount_paid: model.amount_paid,
            waived_amount: model.waived_amount,
            balance: model.balance,
            payment_status: model.payment_status,
            is_paid: model.is_paid,
            is_waived: model.is_waived,
            waived_reason: model.waived_reason,
            waived_at: model.waived_at,
            due_date: model.due_date,
            is_overdue: model.is_overdue,
            days_overdue: model.days_overdue,
            paid_at: model.paid_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateContributionRequest {
    pub parent_id: i32,
    pub project_id: Option<i32>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Defaults to the configured contribution amount
    pub amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

/// Assigns one contribution to every active parent
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ContributionBatchRequest {
    pub project_id: Option<i32>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Defaults to the configured contribution amount
    pub amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContributionBatchResponse {
    pub created: usize,
    pub contributions: Vec<ContributionResponse>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateContributionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    /// Removes the due date when true
    #[serde(default)]
    pub clear_due_date: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ContributionListQuery {
    /// Admins only; parents always see their own contributions
    pub parent_id: Option<i32>,
    pub project_id: Option<i32>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContributionPaymentResponse {
    pub contribution: ContributionResponse,
    pub payment: PaymentResponse,
}

async fn terms_with_defaults(
    state: &AppState,
    project_id: Option<i32>,
    title: String,
    description: Option<String>,
    amount: Option<Decimal>,
    discount_amount: Option<Decimal>,
    due_date: Option<NaiveDate>,
) -> ApiResult<ContributionTerms> {
    let amount = match amount {
        Some(amount) => amount,
        None => current_settings(state).await?.default_contribution_amount,
    };
    Ok(ContributionTerms {
        project_id,
        title: title.trim().to_string(),
        description: description.filter(|d| !d.trim().is_empty()),
        amount,
        discount_amount: discount_amount.unwrap_or(Decimal::ZERO),
        due_date,
    })
}

/// List contributions
#[utoipa::path(
    get,
    path = "/api/v1/contributions",
    tag = "contributions",
    params(ContributionListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Contributions retrieved", body = ApiResponse<Vec<ContributionResponse>>),
        (status = 403, description = "Not allowed to view these contributions", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_contributions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ContributionListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ContributionResponse>>>> {
    let filter = ContributionFilter {
        parent_id: auth.scope_parent(query.parent_id)?,
        project_id: query.project_id,
        status: query.status,
    };
    let rows = contribution::list_contributions(&state.db, &filter).await?;
    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(ContributionResponse::from).collect(),
        "Contributions retrieved successfully",
    )))
}

/// Assign a contribution to one parent
#[utoipa::path(
    post,
    path = "/api/v1/contributions",
    tag = "contributions",
    request_body = CreateContributionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Contribution created", body = ApiResponse<ContributionResponse>),
        (status = 400, description = "Invalid amounts", body = ErrorResponse),
        (status = 404, description = "Parent or project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_contribution(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateContributionRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ContributionResponse>>)> {
    trace!("Entering create_contribution function");
    auth.require_admin()?;
    request.validate()?;

    let terms = terms_with_defaults(
        &state,
        request.project_id,
        request.title,
        request.description,
        request.amount,
        request.discount_amount,
        request.due_date,
    )
    .await?;
    let created = contribution::create_contribution(&state.db, request.parent_id, terms, now()).await?;

    info!("Contribution {} created for parent {}", created.id, created.parent_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ContributionResponse::from(created),
            "Contribution created successfully",
        )),
    ))
}

/// Assign a contribution to every active parent
#[utoipa::path(
    post,
    path = "/api/v1/contribution-batches",
    tag = "contributions",
    request_body = ContributionBatchRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Contributions created", body = ApiResponse<ContributionBatchResponse>),
        (status = 400, description = "Invalid amounts", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_contribution_batch(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ContributionBatchRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ContributionBatchResponse>>)> {
    auth.require_admin()?;
    request.validate()?;

    let terms = terms_with_defaults(
        &state,
        request.project_id,
        request.title,
        request.description,
        request.amount,
        request.discount_amount,
        request.due_date,
    )
    .await?;
    let created = contribution::create_contributions_for_all_parents(&state.db, terms, now()).await?;

    let count = created.len();
    info!("Contribution batch by {} created {} records", auth.id(), count);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ContributionBatchResponse {
                created: count,
                contributions: created.into_iter().map(ContributionResponse::from).collect(),
            },
            format!("Contribution assigned to {} parents", count),
        )),
    ))
}

/// Get a contribution by ID
#[utoipa::path(
    get,
    path = "/api/v1/contributions/{contribution_id}",
    tag = "contributions",
    params(("contribution_id" = i32, Path, description = "Contribution ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Contribution retrieved", body = ApiResponse<ContributionResponse>),
        (status = 403, description = "Not your contribution", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_contribution(
    Path(contribution_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ContributionResponse>>> {
    let row = contribution::get_contribution(&state.db, contribution_id).await?;
    auth.ensure_can_view_parent(row.parent_id)?;
    Ok(Json(ApiResponse::ok(
        ContributionResponse::from(row),
        "Contribution retrieved successfully",
    )))
}

/// Edit a contribution that has no payments yet
#[utoipa::path(
    put,
    path = "/api/v1/contributions/{contribution_id}",
    tag = "contributions",
    params(("contribution_id" = i32, Path, description = "Contribution ID")),
    request_body = UpdateContributionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Contribution updated", body = ApiResponse<ContributionResponse>),
        (status = 400, description = "Locked by payments, paid or waived, or invalid amounts", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_contribution(
    Path(contribution_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateContributionRequest>,
) -> ApiResult<Json<ApiResponse<ContributionResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let due_date = if request.clear_due_date {
        Some(None)
    } else {
        request.due_date.map(Some)
    };
    let update = ContributionUpdate {
        title: request.title.map(|t| t.trim().to_string()),
        description: request
            .description
            .map(|d| Some(d).filter(|d| !d.trim().is_empty())),
        amount: request.amount,
        discount_amount: request.discount_amount,
        due_date,
    };
    let updated = contribution::update_contribution(&state.db, contribution_id, update, now()).await?;

    info!("Contribution {} updated by {}", contribution_id, auth.id());
    Ok(Json(ApiResponse::ok(
        ContributionResponse::from(updated),
        "Contribution updated successfully",
    )))
}

/// Delete a contribution without payment history
#[utoipa::path(
    delete,
    path = "/api/v1/contributions/{contribution_id}",
    tag = "contributions",
    params(("contribution_id" = i32, Path, description = "Contribution ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Contribution deleted"),
        (status = 400, description = "Contribution has payments or is waived", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_contribution(
    Path(contribution_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    contribution::delete_contribution(&state.db, contribution_id).await?;
    info!("Contribution {} deleted by {}", contribution_id, auth.id());
    Ok(StatusCode::NO_CONTENT)
}

/// Record a payment against a contribution
#[utoipa::path(
    post,
    path = "/api/v1/contributions/{contribution_id}/payments",
    tag = "contributions",
    params(("contribution_id" = i32, Path, description = "Contribution ID")),
    request_body = RecordPaymentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<ContributionPaymentResponse>),
        (status = 400, description = "Amount exceeds balance, or contribution is paid or waived", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn record_payment(
    Path(contribution_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RecordPaymentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ContributionPaymentResponse>>)> {
    auth.require_admin()?;
    request.validate()?;

    let payment = PaymentInput {
        amount: request.amount,
        method: request.method,
        reference: request.reference,
        notes: request.notes,
        recorded_by: Some(auth.id()),
    };
    let (updated, payment) =
        contribution::record_contribution_payment(&state.db, contribution_id, payment, now()).await?;

    info!(
        "Payment {} of {} recorded on contribution {}; balance {}",
        payment.id, payment.amount, contribution_id, updated.balance
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ContributionPaymentResponse {
                contribution: ContributionResponse::from(updated),
                payment: PaymentResponse::from(payment),
            },
            "Payment recorded successfully",
        )),
    ))
}

/// Payment history of a contribution
#[utoipa::path(
    get,
    path = "/api/v1/contributions/{contribution_id}/payments",
    tag = "contributions",
    params(("contribution_id" = i32, Path, description = "Contribution ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments retrieved", body = ApiResponse<Vec<PaymentResponse>>),
        (status = 403, description = "Not your contribution", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_payments(
    Path(contribution_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<PaymentResponse>>>> {
    let row = contribution::get_contribution(&state.db, contribution_id).await?;
    auth.ensure_can_view_parent(row.parent_id)?;

    let payments = contribution::list_contribution_payments(&state.db, contribution_id).await?;
    Ok(Json(ApiResponse::ok(
        payments.into_iter().map(PaymentResponse::from).collect(),
        "Payments retrieved successfully",
    )))
}

/// Waive the remaining balance of a contribution
#[utoipa::path(
    post,
    path = "/api/v1/contributions/{contribution_id}/waive",
    tag = "contributions",
    params(("contribution_id" = i32, Path, description = "Contribution ID")),
    request_body = WaiveRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Contribution waived", body = ApiResponse<ContributionResponse>),
        (status = 400, description = "Contribution is already paid or waived", body = ErrorResponse),
        (status = 404, description = "Contribution not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn waive_contribution(
    Path(contribution_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<WaiveRequest>,
) -> ApiResult<Json<ApiResponse<ContributionResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let reason = request.reason.filter(|r| !r.trim().is_empty());
    let updated = contribution::waive_contribution(&state.db, contribution_id, reason, now()).await?;

    info!(
        "Contribution {} waived by {} ({})",
        contribution_id,
        auth.id(),
        updated.waived_amount
    );
    Ok(Json(ApiResponse::ok(
        ContributionResponse::from(updated),
        "Contribution waived successfully",
    )))
}
