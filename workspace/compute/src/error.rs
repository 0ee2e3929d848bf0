use thiserror::Error;

/// Error types for the compute module
///
/// Every variant except `Database` carries a message meant for the API caller.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A referenced record does not exist
    #[error("{0}")]
    NotFound(String),

    /// The request itself is malformed (negative amounts, discount above amount, ...)
    #[error("{0}")]
    InvalidInput(String),

    /// The request is well formed but a business rule forbids it
    #[error("{0}")]
    Rule(String),
}

impl ComputeError {
    pub fn not_found(entity: &str, id: i32) -> Self {
        ComputeError::NotFound(format!("{} with id {} not found", entity, id))
    }
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
