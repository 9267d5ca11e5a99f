use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use application::UploadError;
        use domain::{DomainError, RepositoryError};

        match error {
            AppErr::Domain(DomainError::ValidationError { field, message }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("{}: {}", field, message),
            ),
            AppErr::Domain(DomainError::PermissionDenied { action }) => ApiError::new(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                format!("not allowed to {}", action),
            ),
            AppErr::Domain(DomainError::ResourceNotFound {
                resource_type,
                resource_id,
            }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} {} not found", resource_type, resource_id),
            ),
            AppErr::Domain(DomainError::BusinessRuleViolation { rule }) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "DATA_INTEGRITY", rule)
            }
            AppErr::Repository(RepositoryError::Conflict { message }) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", message)
            }
            AppErr::Repository(RepositoryError::Storage { message }) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                format!("database error: {}", message),
            ),
            AppErr::Upload(UploadError::Storage(message)) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPLOAD_ERROR",
                format!("upload error: {}", message),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
