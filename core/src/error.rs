// =============================================================================
// Shared error taxonomy
// =============================================================================
//
// `AppError` is the one error type every component boundary in Aurora speaks.
// Library code returns it with `?`; binaries wrap it in `anyhow::Result` at
// the outer edge, same split as the teacher's `binance::client` (internal
// `anyhow::Context` chains) vs. its `main.rs` (`anyhow::Result<()>`).
//
// `error_code` maps a variant onto the stable wire vocabulary from the
// protocol spec so the gateway can turn any failure into an `ERROR` frame
// without the rest of the system knowing about wire format.
// =============================================================================

use crate::protocol::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("upstream exchange error: {0}")]
    Upstream(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map this error onto the stable `data.errorCode` vocabulary (spec §6).
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::InternalError,
            AppError::Upstream(_) => ErrorCode::ServiceUnavailable,
            AppError::Protocol(_) => ErrorCode::UnknownAction,
            AppError::Timeout(_) => ErrorCode::Timeout,
            AppError::NotFound(_) => ErrorCode::SymbolNotFound,
            AppError::Validation(_) => ErrorCode::InvalidParameters,
            AppError::RateLimited => ErrorCode::RateLimitExceeded,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}
