///! JSON error responses for the HTTP surface
///!
///! Every handler error ends up as an `ApiError`; cluster errors convert
///! through `kubernetes::error`, shared store errors convert here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,

    /// Stable code for programmatic handling, e.g. `CLUSTER_UNREACHABLE`
    pub error: String,

    pub message: String,

    /// Underlying cause, only set for server-side failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Handler-level error, one variant per response status
#[derive(Debug)]
pub enum ApiError {
    /// 500
    Internal(String),

    /// 404
    NotFound(String),

    /// 403: caller lacks the role, grant or level for the action
    Forbidden(String),

    /// 409: duplicate cluster name or disabled cluster
    Conflict(String),

    /// 422: bad input, invalid credential or unsupported cluster version
    ValidationError(String),

    /// 503: the remote cluster could not be reached
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn superadmin_required() -> Self {
        ApiError::Forbidden("Superadmin privileges required".to_string())
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            ApiError::Internal(msg) => {
                error!("Internal API error: {}", msg);
                ErrorResponse::new(500, "INTERNAL_ERROR", "An internal server error occurred")
                    .with_details(msg)
            }
            ApiError::NotFound(msg) => ErrorResponse::new(404, "NOT_FOUND", msg),
            ApiError::Forbidden(msg) => ErrorResponse::new(403, "FORBIDDEN", msg),
            ApiError::Conflict(msg) => ErrorResponse::new(409, "CONFLICT", msg),
            ApiError::ValidationError(msg) => ErrorResponse::new(422, "VALIDATION_ERROR", msg),
            ApiError::ServiceUnavailable(msg) => {
                ErrorResponse::new(503, "CLUSTER_UNREACHABLE", msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.to_error_response();
        let status = StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(body)).into_response()
    }
}

impl From<kubeward_common::Error> for ApiError {
    fn from(err: kubeward_common::Error) -> Self {
        use kubeward_common::Error;

        match err {
            Error::InvalidConfig(msg) | Error::Validation(msg) => ApiError::ValidationError(msg),
            Error::UserNotFound(id) => ApiError::NotFound(format!("User '{}' not found", id)),
            Error::RoleNotFound(id) => ApiError::NotFound(format!("Role '{}' not found", id)),
            Error::System(msg) => ApiError::Internal(msg),
        }
    }
}
