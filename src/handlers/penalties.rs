use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use compute::balance::PaymentInput;
use compute::penalty::{self, NewPenalty, PenaltyFilter, PenaltyUpdate};
use model::entities::payment::PaymentStatus;
use model::entities::penalty as penalty_entity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::now;
use crate::schemas::{
    ApiResponse, AppState, ErrorResponse, PaymentResponse, RecordPaymentRequest, WaiveRequest,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PenaltyResponse {
    pub id: i32,
    pub parent_id: i32,
    pub meeting_id: Option<i32>,
    pub attendance_id: Option<i32>,
    pub reason: String,
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

impl From<penalty_entity::Model> for PenaltyResponse {
    fn from(model: penalty_entity::Model) -> Self {
        Self {
            id: model.id,
            parent_id: model.parent_id,
            meeting_id: model.meeting_id,
            attendance_id: model.attendance_id,
            reason: model.reason,
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
pub struct CreatePenaltyRequest {
    pub parent_id: i32,
    pub meeting_id: Option<i32>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub amount: Decimal,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdatePenaltyRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
    pub amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    /// Removes the due date when true
    #[serde(default)]
    pub clear_due_date: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PenaltyListQuery {
    /// Admins only; parents always see their own penalties
    pub parent_id: Option<i32>,
    pub meeting_id: Option<i32>,
    pub status: Option<PaymentStatus>,
}

/// The updated penalty and the payment row appended to its history
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PenaltyPaymentResponse {
    pub penalty: PenaltyResponse,
    pub payment: PaymentResponse,
}

/// List penalties
#[utoipa::path(
    get,
    path = "/api/v1/penalties",
    tag = "penalties",
    params(PenaltyListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Penalties retrieved", body = ApiResponse<Vec<PenaltyResponse>>),
        (status = 403, description = "Not allowed to view these penalties", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_penalties(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PenaltyListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<PenaltyResponse>>>> {
    let filter = PenaltyFilter {
        parent_id: auth.scope_parent(query.parent_id)?,
        meeting_id: query.meeting_id,
        status: query.status,
    };
    let rows = penalty::list_penalties(&state.db, &filter).await?;
    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(PenaltyResponse::from).collect(),
        "Penalties retrieved successfully",
    )))
}

/// Create a penalty manually
#[utoipa::path(
    post,
    path = "/api/v1/penalties",
    tag = "penalties",
    request_body = CreatePenaltyRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Penalty created", body = ApiResponse<PenaltyResponse>),
        (status = 400, description = "Invalid amounts", body = ErrorResponse),
        (status = 404, description = "Parent or meeting not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_penalty(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreatePenaltyRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PenaltyResponse>>)> {
    trace!("Entering create_penalty function");
    auth.require_admin()?;
    request.validate()?;

    let input = NewPenalty {
        parent_id: request.parent_id,
        meeting_id: request.meeting_id,
        attendance_id: None,
        reason: request.reason.trim().to_string(),
        amount: request.amount,
        discount_amount: request.discount_amount.unwrap_or(Decimal::ZERO),
        due_date: request.due_date,
    };
    let created = penalty::create_penalty(&state.db, input, now()).await?;

    info!("Penalty {} created for parent {}", created.id, created.parent_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            PenaltyResponse::from(created),
            "Penalty created successfully",
        )),
    ))
}

/// Get a penalty by ID
#[utoipa::path(
    get,
    path = "/api/v1/penalties/{penalty_id}",
    tag = "penalties",
    params(("penalty_id" = i32, Path, description = "Penalty ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Penalty retrieved", body = ApiResponse<PenaltyResponse>),
        (status = 403, description = "Not your penalty", body = ErrorResponse),
        (status = 404, description = "Penalty not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_penalty(
    Path(penalty_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<PenaltyResponse>>> {
    let row = penalty::get_penalty(&state.db, penalty_id).await?;
    auth.ensure_can_view_parent(row.parent_id)?;
    Ok(Json(ApiResponse::ok(
        PenaltyResponse::from(row),
        "Penalty retrieved successfully",
    )))
}

/// Edit a penalty that has no payments yet
#[utoipa::path(
    put,
    path = "/api/v1/penalties/{penalty_id}",
    tag = "penalties",
    params(("penalty_id" = i32, Path, description = "Penalty ID")),
    request_body = UpdatePenaltyRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Penalty updated", body = ApiResponse<PenaltyResponse>),
        (status = 400, description = "Locked by payments, paid or waived, or invalid amounts", body = ErrorResponse),
        (status = 404, description = "Penalty not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_penalty(
    Path(penalty_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdatePenaltyRequest>,
) -> ApiResult<Json<ApiResponse<PenaltyResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let due_date = if request.clear_due_date {
        Some(None)
    } else {
        request.due_date.map(Some)
    };
    let update = PenaltyUpdate {
        reason: request.reason.map(|r| r.trim().to_string()),
        amount: request.amount,
        discount_amount: request.discount_amount,
        due_date,
    };
    let updated = penalty::update_penalty(&state.db, penalty_id, update, now()).await?;

    info!("Penalty {} updated by {}", penalty_id, auth.id());
    Ok(Json(ApiResponse::ok(
        PenaltyResponse::from(updated),
        "Penalty updated successfully",
    )))
}

/// Delete a penalty without payment history
#[utoipa::path(
    delete,
    path = "/api/v1/penalties/{penalty_id}",
    tag = "penalties",
    params(("penalty_id" = i32, Path, description = "Penalty ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Penalty deleted"),
        (status = 400, description = "Penalty has payments or is waived", body = ErrorResponse),
        (status = 404, description = "Penalty not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_penalty(
    Path(penalty_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    penalty::delete_penalty(&state.db, penalty_id).await?;
    info!("Penalty {} deleted by {}", penalty_id, auth.id());
    Ok(StatusCode::NO_CONTENT)
}

/// Record a payment against a penalty
#[utoipa::path(
    post,
    path = "/api/v1/penalties/{penalty_id}/payments",
    tag = "penalties",
    params(("penalty_id" = i32, Path, description = "Penalty ID")),
    request_body = RecordPaymentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<PenaltyPaymentResponse>),
        (status = 400, description = "Amount exceeds balance, or penalty is paid or waived", body = ErrorResponse),
        (status = 404, description = "Penalty not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn record_payment(
    Path(penalty_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RecordPaymentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PenaltyPaymentResponse>>)> {
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
        penalty::record_penalty_payment(&state.db, penalty_id, payment, now()).await?;

    info!(
        "Payment {} of {} recorded on penalty {}; balance {}",
        payment.id, payment.amount, penalty_id, updated.balance
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            PenaltyPaymentResponse {
                penalty: PenaltyResponse::from(updated),
                payment: PaymentResponse::from(payment),
            },
            "Payment recorded successfully",
        )),
    ))
}

/// Payment history of a penalty
#[utoipa::path(
    get,
    path = "/api/v1/penalties/{penalty_id}/payments",
    tag = "penalties",
    params(("penalty_id" = i32, Path, description = "Penalty ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments retrieved", body = ApiResponse<Vec<PaymentResponse>>),
        (status = 403, description = "Not your penalty", body = ErrorResponse),
        (status = 404, description = "Penalty not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_payments(
    Path(penalty_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<PaymentResponse>>>> {
    let row = penalty::get_penalty(&state.db, penalty_id).await?;
    auth.ensure_can_view_parent(row.parent_id)?;

    let payments = penalty::list_penalty_payments(&state.db, penalty_id).await?;
    Ok(Json(ApiResponse::ok(
        payments.into_iter().map(PaymentResponse::from).collect(),
        "Payments retrieved successfully",
    )))
}

/// Waive the remaining balance of a penalty
#[utoipa::path(
    post,
    path = "/api/v1/penalties/{penalty_id}/waive",
    tag = "penalties",
    params(("penalty_id" = i32, Path, description = "Penalty ID")),
    request_body = WaiveRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Penalty waived", body = ApiResponse<PenaltyResponse>),
        (status = 400, description = "Penalty is already paid or waived", body = ErrorResponse),
        (status = 404, description = "Penalty not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn waive_penalty(
    Path(penalty_id): Path<i32>,
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<WaiveRequest>,
) -> ApiResult<Json<ApiResponse<PenaltyResponse>>> {
    auth.require_admin()?;
    request.validate()?;

    let reason = request.reason.filter(|r| !r.trim().is_empty());
    let updated = penalty::waive_penalty(&state.db, penalty_id, reason, now()).await?;

    info!("Penalty {} waived by {} ({})", penalty_id, auth.id(), updated.waived_amount);
    Ok(Json(ApiResponse::ok(
        PenaltyResponse::from(updated),
        "Penalty waived successfully",
    )))
}
