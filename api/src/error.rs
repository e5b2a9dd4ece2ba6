use authn::AuthnError;
use authz::AuthzError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Media type of every error body.
pub const PROBLEM_JSON: &str = "application/problem+json";

/// API Error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// RFC 9457 problem details body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ProblemDetails {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            problem_type: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
        }
    }
}

impl ApiError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for the error type
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing detail. Internal errors are not described.
    fn detail(&self) -> String {
        match self {
            ApiError::Unauthorized => "Authentication is required to access this resource".to_string(),
            ApiError::Forbidden => "You are not allowed to perform this request".to_string(),
            ApiError::BadRequest(message) => message.clone(),
            ApiError::NotImplemented(_) => {
                "The configured authentication type is not implemented".to_string()
            }
            ApiError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    pub fn problem(&self) -> ProblemDetails {
        let status = self.status_code();
        ProblemDetails::new(
            status,
            status.canonical_reason().unwrap_or(self.error_code()),
            self.detail(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Internal(_) | ApiError::NotImplemented(_)) {
            error!(code = self.error_code(), "{}", self);
        }
        let mut response = (self.status_code(), Json(self.problem())).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}

impl From<AuthnError> for ApiError {
    fn from(err: AuthnError) -> Self {
        match err {
            AuthnError::NotImplemented(auth_type) => ApiError::NotImplemented(auth_type),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
