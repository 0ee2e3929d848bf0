use chrono::NaiveDateTime;
use model::entities::payment::{PaymentMethod, PaymentStatus};
use model::entities::{contribution_payment, penalty_payment, settings};
use moka::future::Cache;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use validator::Validate;

use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::notifications::Mailer;

pub use common::ApiResponse;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// In-process cache; holds the settings row
    pub cache: Cache<String, CachedData>,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtManager>,
    pub mailer: Arc<dyn Mailer>,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Settings(settings::Model),
}

/// Error response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Body of the payment endpoints of penalties and contributions
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RecordPaymentRequest {
    /// Amount paid; must not exceed the remaining balance
    #[schema(value_type = String, example = "200.00")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Receipt or transfer reference
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct WaiveRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// A row of payment history
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i32,
    /// Id of the penalty or contribution that was paid
    pub record_id: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub paid_at: NaiveDateTime,
    pub recorded_by: Option<i32>,
}

impl From<penalty_payment::Model> for PaymentResponse {
    fn from(model: penalty_payment::Model) -> Self {
        Self {
            id: model.id,
            record_id: model.penalty_id,
            amount: model.amount,
            method: model.method,
            reference: model.reference,
            notes: model.notes,
            paid_at: model.paid_at,
            recorded_by: model.recorded_by,
        }
    }
}

impl From<contribution_payment::Model> for PaymentResponse {
    fn from(model: contribution_payment::Model) -> Self {
        Self {
            id: model.id,
            record_id: model.contribution_id,
            amount: model.amount,
            method: model.method,
            reference: model.reference,
            notes: model.notes,
            paid_at: model.paid_at,
            recorded_by: model.recorded_by,
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::verify_email,
        crate::handlers::auth::resend_otp,
        crate::handlers::auth::login,
        crate::handlers::auth::forgot_password,
        crate::handlers::auth::reset_password,
        crate::handlers::auth::change_password,
        crate::handlers::auth::me,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::deactivate_user,
        crate::handlers::students::create_student,
        crate::handlers::students::get_students,
        crate::handlers::students::get_student,
        crate::handlers::students::update_student,
        crate::handlers::students::delete_student,
        crate::handlers::students::request_link,
        crate::handlers::students::get_links,
        crate::handlers::students::approve_link,
        crate::handlers::students::reject_link,
        crate::handlers::students::get_parent_students,
        crate::handlers::meetings::create_meeting,
        crate::handlers::meetings::get_meetings,
        crate::handlers::meetings::get_meeting,
        crate::handlers::meetings::update_meeting,
        crate::handlers::meetings::delete_meeting,
        crate::handlers::meetings::generate_qr_code,
        crate::handlers::meetings::finalize_meeting,
        crate::handlers::meetings::get_attendance_summary,
        crate::handlers::attendance::scan_qr_code,
        crate::handlers::attendance::record_attendance,
        crate::handlers::attendance::get_attendance,
        crate::handlers::penalties::get_penalties,
        crate::handlers::penalties::create_penalty,
        crate::handlers::penalties::get_penalty,
        crate::handlers::penalties::update_penalty,
        crate::handlers::penalties::delete_penalty,
        crate::handlers::penalties::record_payment,
        crate::handlers::penalties::get_payments,
        crate::handlers::penalties::waive_penalty,
        crate::handlers::contributions::get_contributions,
        crate::handlers::contributions::create_contribution,
        crate::handlers::contributions::create_contribution_batch,
        crate::handlers::contributions::get_contribution,
        crate::handlers::contributions::update_contribution,
        crate::handlers::contributions::delete_contribution,
        crate::handlers::contributions::record_payment,
        crate::handlers::contributions::get_payments,
        crate::handlers::contributions::waive_contribution,
        crate::handlers::projects::create_project,
        crate::handlers::projects::get_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::delete_project,
        crate::handlers::projects::get_expenses,
        crate::handlers::projects::add_expense,
        crate::handlers::projects::update_expense,
        crate::handlers::projects::delete_expense,
        crate::handlers::projects::recalculate_totals,
        crate::handlers::announcements::create_announcement,
        crate::handlers::announcements::get_announcements,
        crate::handlers::announcements::get_announcement,
        crate::handlers::announcements::update_announcement,
        crate::handlers::announcements::delete_announcement,
        crate::handlers::announcements::publish_announcement,
        crate::handlers::officers::create_officer,
        crate::handlers::officers::get_officers,
        crate::handlers::officers::get_officer,
        crate::handlers::officers::update_officer,
        crate::handlers::officers::delete_officer,
        crate::handlers::settings::get_settings,
        crate::handlers::settings::update_settings,
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::dashboard::get_my_summary,
        crate::handlers::dashboard::get_parent_summary,
        crate::handlers::dashboard::scan_overdue,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            RecordPaymentRequest,
            WaiveRequest,
            PaymentResponse,
            PaymentMethod,
            PaymentStatus,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::VerifyEmailRequest,
            crate::handlers::auth::EmailRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::ResetPasswordRequest,
            crate::handlers::auth::ChangePasswordRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::students::StudentResponse,
            crate::handlers::students::CreateStudentRequest,
            crate::handlers::students::UpdateStudentRequest,
            crate::handlers::students::LinkRequest,
            crate::handlers::students::RejectLinkRequest,
            crate::handlers::students::StudentLinkResponse,
            crate::handlers::meetings::MeetingResponse,
            crate::handlers::meetings::CreateMeetingRequest,
            crate::handlers::meetings::UpdateMeetingRequest,
            crate::handlers::meetings::QrCodeResponse,
            crate::handlers::attendance::ScanRequest,
            crate::handlers::attendance::RecordAttendanceRequest,
            crate::handlers::attendance::AttendanceResponse,
            crate::handlers::penalties::PenaltyResponse,
            crate::handlers::penalties::CreatePenaltyRequest,
            crate::handlers::penalties::UpdatePenaltyRequest,
            crate::handlers::penalties::PenaltyPaymentResponse,
            crate::handlers::contributions::ContributionResponse,
            crate::handlers::contributions::CreateContributionRequest,
            crate::handlers::contributions::ContributionBatchRequest,
            crate::handlers::contributions::ContributionBatchResponse,
            crate::handlers::contributions::UpdateContributionRequest,
            crate::handlers::contributions::ContributionPaymentResponse,
            crate::handlers::projects::ProjectResponse,
            crate::handlers::projects::CreateProjectRequest,
            crate::handlers::projects::UpdateProjectRequest,
            crate::handlers::projects::ExpenseResponse,
            crate::handlers::projects::CreateExpenseRequest,
            crate::handlers::projects::UpdateExpenseRequest,
            crate::handlers::projects::ExpenseLedgerResponse,
            crate::handlers::announcements::AnnouncementResponse,
            crate::handlers::announcements::CreateAnnouncementRequest,
            crate::handlers::announcements::UpdateAnnouncementRequest,
            crate::handlers::officers::OfficerResponse,
            crate::handlers::officers::CreateOfficerRequest,
            crate::handlers::officers::UpdateOfficerRequest,
            crate::handlers::settings::SettingsResponse,
            crate::handlers::settings::UpdateSettingsRequest,
            model::entities::user::UserRole,
            model::entities::parent_student::LinkStatus,
            model::entities::meeting::MeetingStatus,
            model::entities::attendance::AttendanceStatus,
            model::entities::project::ProjectStatus,
            model::entities::announcement::AnnouncementPriority,
            common::AttendanceSummary,
            common::PenaltyRunSummary,
            common::OverdueScanSummary,
            common::MoneyTotals,
            common::DashboardSummary,
            common::ParentBalanceSummary,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and one-time codes"),
        (name = "users", description = "User administration"),
        (name = "students", description = "Students and parent links"),
        (name = "meetings", description = "Meetings and QR codes"),
        (name = "attendance", description = "Meeting attendance"),
        (name = "penalties", description = "Attendance penalties and their payments"),
        (name = "contributions", description = "Contributions and their payments"),
        (name = "projects", description = "Projects and expense ledger"),
        (name = "announcements", description = "Announcements"),
        (name = "officers", description = "Association officers"),
        (name = "settings", description = "System settings"),
        (name = "dashboard", description = "Summaries and batch jobs"),
    ),
    info(
        title = "PTA Desk API",
        description = "Parent-teacher association management: attendance, penalties, contributions and project funds",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme referenced by protected operations.
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
