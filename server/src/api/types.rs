//! Shared API error type
//!
//! `ApiError` is the common internal error representation; gRPC handlers map
//! it onto `tonic::Status` via [`ApiError::into_status`], and the axum health
//! surface maps it onto an HTTP response via `IntoResponse`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tonic::Status;

/// Standard internal error representation
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    Conflict { code: String, message: String },
    ServiceUnavailable { message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn from_sqlite(e: crate::data::sqlite::SqliteError) -> Self {
        tracing::error!(error = %e, "SQLite error");
        Self::Internal {
            message: "Database operation failed".to_string(),
        }
    }

    /// Map a repository error onto the taxonomy: `NotFound` passes through,
    /// everything else becomes `Internal` (constraint violations are surfaced
    /// as `Conflict` by the caller, which knows which constraint it expected).
    pub fn from_data(e: crate::data::DataError) -> Self {
        match e {
            crate::data::DataError::NotFound => {
                Self::not_found("NOT_FOUND", "Resource not found")
            }
            crate::data::DataError::Conflict(msg) => Self::conflict("CONFLICT", msg),
            other => {
                tracing::error!(error = %other, "Data error");
                Self::Internal {
                    message: "Database operation failed".to_string(),
                }
            }
        }
    }

    /// Map onto the RPC error taxonomy (`{NotFound, InvalidInput,
    /// PermissionDenied, AlreadyExists, Unauthenticated, RateLimited,
    /// Internal}`) and its transport-native gRPC code.
    pub fn into_status(self) -> Status {
        match self {
            Self::BadRequest { message, .. } => Status::invalid_argument(message),
            Self::NotFound { message, .. } => Status::not_found(message),
            Self::Unauthorized { message, .. } => Status::unauthenticated(message),
            Self::Forbidden { message, .. } => Status::permission_denied(message),
            Self::Conflict { message, .. } => Status::already_exists(message),
            Self::ServiceUnavailable { message } => Status::unavailable(message),
            Self::Internal { message } => Status::internal(message),
        }
    }
}

impl From<ApiError> for Status {
    fn from(e: ApiError) -> Self {
        e.into_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", code, message)
            }
            Self::Forbidden { code, message } => {
                (StatusCode::FORBIDDEN, "forbidden", code, message)
            }
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::ServiceUnavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "SERVICE_UNAVAILABLE".to_string(),
                message,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}
