use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic error conversion and
/// display formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors (malformed target address or quantity)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested quantity exceeds the user's credit balance
    #[error("Insufficient credits for the requested quantity")]
    InsufficientCredits,

    /// User hit the daily dispatch ceiling
    #[error("Daily dispatch limit of {0} reached")]
    DailyLimitExceeded(i64),

    /// Administrator-only action attempted by a regular user
    #[error("Permission denied")]
    PermissionDenied,

    /// Voucher key not found or already redeemed
    #[error("Invalid or already used key")]
    InvalidOrUsedKey,

    /// External bulk-dispatch call failed (network, timeout, or error payload)
    #[error("External dispatch call failed: {0}")]
    ExternalCall(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<crate::core::validation::ValidationError> for AppError {
    fn from(err: crate::core::validation::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}
