use crate::error::ErrorCategory;
use apex_derive::api_model;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

#[api_model]
/// Error envelope returned by every failing endpoint.
pub struct ErrorBody {
    /// Stable `snake_case` error code, e.g. `duplicate_attempt`.
    pub error: String,
    /// Error class: `validation`, `not_found`, `conflict` or `internal`.
    pub category: String,
    pub message: String,
    /// Structured detail such as ladder violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// HTTP face of a slice error.
#[derive(Debug)]
pub struct ApiError {
    category: ErrorCategory,
    body: ErrorBody,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(category: ErrorCategory, code: &str, message: impl Into<String>) -> Self {
        Self {
            category,
            body: ErrorBody {
                error: code.to_owned(),
                category: category.as_str().to_owned(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, "invalid_request", message)
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.body.details = Some(details);
        self
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    #[must_use]
    pub const fn body(&self) -> &ErrorBody {
        &self.body
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.category {
            ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::security::resource::ResourceGuardError> for ApiError {
    fn from(err: crate::security::resource::ResourceGuardError) -> Self {
        Self::new(ErrorCategory::Validation, "invalid_id", err.to_string())
    }
}

impl From<super::ApiStateError> for ApiError {
    fn from(err: super::ApiStateError) -> Self {
        Self::new(ErrorCategory::Internal, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.category == ErrorCategory::Internal {
            error!(code = %self.body.error, message = %self.body.message, "Request failed");
        }
        (status, Json(self.body)).into_response()
    }
}
