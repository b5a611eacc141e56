use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Entitlement not found")]
    EntitlementNotFound,

    #[error("Not enough credits left this month")]
    InsufficientCredits,

    #[error("Payment ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Webhook rejected: {0}")]
    WebhookUnauthenticated(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    RateLimited,
    InvalidInput,
    EntitlementNotFound,
    InsufficientCredits,
    LedgerUnavailable,
    WebhookUnauthenticated,
    AnalysisFailed,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::EntitlementNotFound => "ENTITLEMENT_NOT_FOUND",
            ErrorCode::InsufficientCredits => "INSUFFICIENT_CREDITS",
            ErrorCode::LedgerUnavailable => "LEDGER_UNAVAILABLE",
            ErrorCode::WebhookUnauthenticated => "WEBHOOK_UNAUTHENTICATED",
            ErrorCode::AnalysisFailed => "ANALYSIS_FAILED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    /// Transient failures that a retry may resolve. Webhook deliveries that
    /// fail with one of these are answered with 5xx so the sender retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Internal(_)
                | AppError::RateLimited
                | AppError::LedgerUnavailable(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
