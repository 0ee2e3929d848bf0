use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use compute::error::ComputeError;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::ErrorResponse;

/// Error returned by every handler; rendered as [`ErrorResponse`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(entity: &str, id: i32) -> Self {
        ApiError::NotFound(format!("{} with id {} not found", entity, id))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(db_err) => ApiError::Database(db_err),
            ComputeError::NotFound(msg) => ApiError::NotFound(msg),
            ComputeError::InvalidInput(msg) | ComputeError::Rule(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: invalid value ({})", field, e.code),
                })
            })
            .collect();
        messages.sort();
        ApiError::Validation(messages.join("; "))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Database(db_err) => {
                error!("Database error: {}", db_err);
                "Internal server error".to_string()
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => {
                warn!("{} {}: {}", status.as_u16(), code, other);
                other.to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
            success: false,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_errors_map_to_statuses() {
        let cases = [
            (ComputeError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ComputeError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ComputeError::Rule("x".into()), StatusCode::BAD_REQUEST),
            (
                ComputeError::Database(DbErr::Custom("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status_and_code().0, expected);
        }
    }

    #[test]
    fn test_rule_message_is_kept() {
        let api: ApiError = ComputeError::Rule("QR code has expired".into()).into();
        assert_eq!(api.to_string(), "QR code has expired");
        assert_eq!(api.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
