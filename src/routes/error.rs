//! HTTP mapping for service errors.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use validator::ValidationErrors;

use crate::{CommerceError, ErrorKind};

#[derive(Debug)]
pub enum ApiError {
    Commerce(CommerceError),
    /// Request body failed shape validation.
    Validation(ValidationErrors),
    /// Body, path or query could not be decoded.
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, errors.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Commerce(err) => match err.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, err.to_string()),
                ErrorKind::Infrastructure => {
                    tracing::error!(error = %err, "internal server error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
                }
            },
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        ApiError::Commerce(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_by_kind() {
        let status = |err: CommerceError| ApiError::from(err).into_response().status();
        assert_eq!(status(CommerceError::CartNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status(CommerceError::EmptyCart(Uuid::nil())), StatusCode::BAD_REQUEST);
        assert_eq!(status(CommerceError::StorageError("boom".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_decode_failure_is_json_400() {
        let response = ApiError::BadRequest("Failed to parse the request body as JSON".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Failed to parse the request body as JSON");
    }
}
