use crate::handlers::{
    announcements::{
        create_announcement, delete_announcement, get_announcement, get_announcements,
        publish_announcement, update_announcement,
    },
    attendance::{get_attendance, record_attendance, scan_qr_code},
    auth::{
        change_password, forgot_password, login, me, register, resend_otp, reset_password,
        verify_email,
    },
    contributions::{
        self, create_contribution, create_contribution_batch, delete_contribution,
        get_contribution, get_contributions, update_contribution, waive_contribution,
    },
    dashboard::{get_dashboard, get_my_summary, get_parent_summary, scan_overdue},
    health::health_check,
    meetings::{
        create_meeting, delete_meeting, finalize_meeting, generate_qr_code,
        get_attendance_summary, get_meeting, get_meetings, update_meeting,
    },
    officers::{create_officer, delete_officer, get_officer, get_officers, update_officer},
    penalties::{
        self, create_penalty, delete_penalty, get_penalties, get_penalty, update_penalty,
        waive_penalty,
    },
    projects::{
        add_expense, create_project, delete_expense, delete_project, get_expenses, get_project,
        get_projects, recalculate_totals, update_expense, update_project,
    },
    settings::{get_settings, update_settings},
    students::{
        approve_link, create_student, delete_student, get_links, get_parent_students,
        get_student, get_students, reject_link, request_link, update_student,
    },
    users::{deactivate_user, get_user, get_users, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Registration, login and password recovery
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/verify-email", post(verify_email))
        .route("/api/v1/auth/resend-otp", post(resend_otp))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/forgot-password", post(forgot_password))
        .route("/api/v1/auth/reset-password", post(reset_password))
        .route("/api/v1/auth/change-password", post(change_password))
        .route("/api/v1/auth/me", get(me))
        // Users
        .route("/api/v1/users", get(get_users))
        .route(
            "/api/v1/users/:user_id",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        // Students and parent links
        .route("/api/v1/students", post(create_student).get(get_students))
        .route(
            "/api/v1/students/:student_id",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/api/v1/student-links", post(request_link).get(get_links))
        .route("/api/v1/student-links/:link_id/approve", put(approve_link))
        .route("/api/v1/student-links/:link_id/reject", put(reject_link))
        .route("/api/v1/parents/:parent_id/students", get(get_parent_students))
        .route("/api/v1/parents/:parent_id/summary", get(get_parent_summary))
        // Settings
        .route("/api/v1/settings", get(get_settings).put(update_settings))
        // Meetings and attendance
        .route("/api/v1/meetings", post(create_meeting).get(get_meetings))
        .route(
            "/api/v1/meetings/:meeting_id",
            get(get_meeting).put(update_meeting).delete(delete_meeting),
        )
        .route("/api/v1/meetings/:meeting_id/qr", post(generate_qr_code))
        .route("/api/v1/meetings/:meeting_id/finalize", post(finalize_meeting))
        .route(
            "/api/v1/meetings/:meeting_id/attendance-summary",
            get(get_attendance_summary),
        )
        .route("/api/v1/attendance", post(record_attendance).get(get_attendance))
        .route("/api/v1/attendance/scan", post(scan_qr_code))
        // Penalties
        .route("/api/v1/penalties", get(get_penalties).post(create_penalty))
        .route(
            "/api/v1/penalties/:penalty_id",
            get(get_penalty).put(update_penalty).delete(delete_penalty),
        )
        .route(
            "/api/v1/penalties/:penalty_id/payments",
            post(penalties::record_payment).get(penalties::get_payments),
        )
        .route("/api/v1/penalties/:penalty_id/waive", post(waive_penalty))
        // Contributions
        .route(
            "/api/v1/contributions",
            get(get_contributions).post(create_contribution),
        )
        .route("/api/v1/contribution-batches", post(create_contribution_batch))
        .route(
            "/api/v1/contributions/:contribution_id",
            get(get_contribution)
                .put(update_contribution)
                .delete(delete_contribution),
        )
        .route(
            "/api/v1/contributions/:contribution_id/payments",
            post(contributions::record_payment).get(contributions::get_payments),
        )
        .route(
            "/api/v1/contributions/:contribution_id/waive",
            post(waive_contribution),
        )
        // Projects and expenses
        .route("/api/v1/projects", post(create_project).get(get_projects))
        .route(
            "/api/v1/projects/:project_id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route(
            "/api/v1/projects/:project_id/expenses",
            get(get_expenses).post(add_expense),
        )
        .route(
            "/api/v1/projects/:project_id/expenses/:expense_id",
            put(update_expense).delete(delete_expense),
        )
        .route(
            "/api/v1/projects/:project_id/recalculate",
            post(recalculate_totals),
        )
        // Announcements
        .route(
            "/api/v1/announcements",
            post(create_announcement).get(get_announcements),
        )
        .route(
            "/api/v1/announcements/:announcement_id",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
        .route(
            "/api/v1/announcements/:announcement_id/publish",
            post(publish_announcement),
        )
        // Officers
        .route("/api/v1/officers", post(create_officer).get(get_officers))
        .route(
            "/api/v1/officers/:officer_id",
            get(get_officer).put(update_officer).delete(delete_officer),
        )
        // Dashboard and maintenance
        .route("/api/v1/dashboard", get(get_dashboard))
        .route("/api/v1/dashboard/me", get(get_my_summary))
        .route("/api/v1/overdue/scan", post(scan_overdue))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
