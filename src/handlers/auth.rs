use axum::{extract::State, http::StatusCode, response::Json};
use model::entities::otp_code::OtpPurpose;
use model::entities::user::{self, UserRole};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{hash_password, issue_otp, verify_otp, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::users::UserResponse;
use crate::handlers::{normalize_email, now};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct VerifyEmailRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub code: String,
}

/// Body carrying only an email address
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub code: String,
    #[validate(length(min = 8, max = 128, message = "must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "must be at least 8 characters"))]
    pub new_password: String,
}

async fn find_by_email(state: &AppState, email: &str) -> ApiResult<Option<user::Model>> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(&state.db)
        .await?)
}

/// Issues a code and mails it. Delivery failures are logged, not returned:
/// the caller can always ask for another code.
async fn send_code(state: &AppState, user: &user::Model, purpose: OtpPurpose) -> ApiResult<()> {
    let ttl = state.config.otp_ttl_minutes;
    let code = issue_otp(&state.db, user.id, purpose, ttl, now()).await?;

    let (subject, what) = match purpose {
        OtpPurpose::EmailVerification => ("Verify your email address", "verification"),
        OtpPurpose::PasswordReset => ("Password reset code", "password reset"),
    };
    let body = format!(
        "Hello {},\n\nYour {} code is {}. It expires in {} minutes.\n\nIf you did not request this, you can ignore this message.",
        user.first_name, what, code, ttl
    );

    if let Err(e) = state.mailer.send(&user.email, subject, &body).await {
        warn!("Could not deliver {:?} code to {}: {:#}", purpose, user.email, e);
    }
    Ok(())
}

/// Register a parent account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; a verification code was emailed", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    trace!("Entering register function");
    request.validate()?;

    let email = normalize_email(&request.email);
    if find_by_email(&state, &email).await?.is_some() {
        return Err(ApiError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(request.password, state.config.bcrypt_cost).await?;
    let timestamp = now();
    let created = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(request.first_name.trim().to_string()),
        last_name: Set(request.last_name.trim().to_string()),
        phone: Set(request.phone.filter(|p| !p.trim().is_empty())),
        role: Set(UserRole::Parent),
        is_active: Set(true),
        is_verified: Set(false),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    send_code(&state, &created, OtpPurpose::EmailVerification).await?;
    info!("Registered parent account {} ({})", created.id, created.email);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            UserResponse::from(created),
            "Registration successful. Check your email for the verification code",
        )),
    ))
}

/// Verify an email address with the emailed code
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    tag = "auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    request.validate()?;

    let user = find_by_email(&state, &request.email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired code".to_string()))?;
    if user.is_verified {
        return Err(ApiError::BadRequest("Email is already verified".to_string()));
    }

    let timestamp = now();
    verify_otp(
        &state.db,
        user.id,
        OtpPurpose::EmailVerification,
        &request.code,
        timestamp,
    )
    .await?;

    let mut active: user::ActiveModel = user.into();
    active.is_verified = Set(true);
    active.updated_at = Set(timestamp);
    let updated = active.update(&state.db).await?;

    info!("Email verified for user {}", updated.id);
    Ok(Json(ApiResponse::ok(
        UserResponse::from(updated),
        "Email verified successfully",
    )))
}

/// Send a new verification code
#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-otp",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "A new code was sent if the account is awaiting verification", body = ApiResponse<String>)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<Json<ApiResponse<String>>> {
    request.validate()?;

    match find_by_email(&state, &request.email).await? {
        Some(user) if !user.is_verified && user.is_active => {
            send_code(&state, &user, OtpPurpose::EmailVerification).await?;
        }
        _ => debug!("No pending verification for {}", request.email),
    }

    Ok(Json(ApiResponse::ok(
        String::new(),
        "If the account is awaiting verification, a new code has been sent",
    )))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials or deactivated account", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    request.validate()?;
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = find_by_email(&state, &request.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(request.password, user.password_hash.clone()).await? {
        warn!("Failed login for user {}", user.id);
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }
    if !user.is_verified {
        return Err(ApiError::Forbidden(
            "Please verify your email before logging in".to_string(),
        ));
    }

    let token = state.jwt.generate_token(&user)?;
    info!("User {} logged in", user.id);
    Ok(Json(ApiResponse::ok(
        LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.expiration_seconds(),
            user: UserResponse::from(user),
        },
        "Login successful",
    )))
}

/// Request a password reset code
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "A reset code was sent if the account exists", body = ApiResponse<String>)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<Json<ApiResponse<String>>> {
    request.validate()?;

    match find_by_email(&state, &request.email).await? {
        Some(user) if user.is_active => {
            send_code(&state, &user, OtpPurpose::PasswordReset).await?;
        }
        _ => debug!("Password reset requested for unknown or inactive account"),
    }

    Ok(Json(ApiResponse::ok(
        String::new(),
        "If an account exists for this email, a reset code has been sent",
    )))
}

/// Reset a password with an emailed code
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<String>),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Json<ApiResponse<String>>> {
    request.validate()?;

    let user = find_by_email(&state, &request.email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired code".to_string()))?;

    let timestamp = now();
    verify_otp(
        &state.db,
        user.id,
        OtpPurpose::PasswordReset,
        &request.code,
        timestamp,
    )
    .await?;

    let password_hash = hash_password(request.new_password, state.config.bcrypt_cost).await?;
    let user_id = user.id;
    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(password_hash);
    // The code arrived by email, which proves ownership of the address.
    active.is_verified = Set(true);
    active.updated_at = Set(timestamp);
    active.update(&state.db).await?;

    info!("Password reset for user {}", user_id);
    Ok(Json(ApiResponse::ok(
        String::new(),
        "Password has been reset. You can now log in",
    )))
}

/// Change the password of the logged-in user
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<String>),
        (status = 400, description = "Current password is incorrect", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.id()))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<String>>> {
    request.validate()?;

    if !verify_password(request.current_password, auth.user.password_hash.clone()).await? {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(request.new_password, state.config.bcrypt_cost).await?;
    let user_id = auth.id();
    let mut active: user::ActiveModel = auth.user.into();
    active.password_hash = Set(password_hash);
    active.updated_at = Set(now());
    active.update(&state.db).await?;

    info!("User {} changed their password", user_id);
    Ok(Json(ApiResponse::ok(
        String::new(),
        "Password changed successfully",
    )))
}

/// The logged-in user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn me(auth: AuthUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::ok(
        UserResponse::from(auth.user),
        "Current user retrieved successfully",
    ))
}
