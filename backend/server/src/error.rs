use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Client-visible failure classes. Every variant carries the message sent back as `{"error": ..}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    ServiceMisconfigured(String),

    #[error("{0}")]
    AnalysisFailed(String),

    #[error("{0}")]
    InternalError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    RateLimited,
    ServiceUnavailable,
    ServiceMisconfigured,
    AnalysisFailed,
    InternalError,
}

impl ErrorKind {
    pub fn with(self, message: impl Into<String>) -> AppError {
        let message = message.into();

        match self {
            ErrorKind::InvalidInput => AppError::InvalidInput(message),
            ErrorKind::Unauthorized => AppError::Unauthorized(message),
            ErrorKind::Forbidden => AppError::Forbidden(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::PayloadTooLarge => AppError::PayloadTooLarge(message),
            ErrorKind::RateLimited => AppError::RateLimited(message),
            ErrorKind::ServiceUnavailable => AppError::ServiceUnavailable(message),
            ErrorKind::ServiceMisconfigured => AppError::ServiceMisconfigured(message),
            ErrorKind::AnalysisFailed => AppError::AnalysisFailed(message),
            ErrorKind::InternalError => AppError::InternalError(message),
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            AppError::RateLimited(_) => ErrorKind::RateLimited,
            AppError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            AppError::ServiceMisconfigured(_) => ErrorKind::ServiceMisconfigured,
            AppError::AnalysisFailed(_) => ErrorKind::AnalysisFailed,
            AppError::InternalError(_) => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ServiceMisconfigured { .. }
            | AppError::AnalysisFailed { .. }
            | AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(_: JsonRejection) -> Self {
        AppError::InvalidInput("Invalid request format".to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(_: QueryRejection) -> Self {
        AppError::InvalidInput("Invalid query parameters".to_string())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(_: MultipartRejection) -> Self {
        AppError::InvalidInput("Invalid file upload format".to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        match error.status() {
            StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge("File too large".to_string()),
            _ => AppError::InvalidInput("Invalid file upload format".to_string()),
        }
    }
}
