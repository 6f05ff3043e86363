//! HTTP-boundary error mapping. `HubError` (domain) -> `ApiError` (status
//! code + wire body), the same split the teacher draws between
//! `vex_persist::StorageError` and `vex_api::ApiError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use iscc_hub_core::error::HubError;
use iscc_hub_persist::db::DbError;
use serde::Serialize;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("{0}")]
    NotFound(String),

    #[error("request body could not be parsed: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Maps each `HubError` variant to the status code in spec §7's error
/// taxonomy table.
fn hub_error_status(err: &HubError) -> StatusCode {
    match err {
        HubError::ValidationFailed { .. }
        | HubError::InvalidFormat { .. }
        | HubError::InvalidLength { .. }
        | HubError::InvalidHex { .. }
        | HubError::InvalidIscc { .. }
        | HubError::TimestampOutOfRange { .. }
        | HubError::NonceMismatch { .. }
        | HubError::InvalidSignature { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        HubError::NonceReuse => StatusCode::CONFLICT,
        HubError::DuplicateDeclaration { .. } => StatusCode::CONFLICT,
        HubError::SequencerError { .. } => StatusCode::SERVICE_UNAVAILABLE,
        HubError::NotFound { .. } => StatusCode::NOT_FOUND,
        HubError::Unauthorized => StatusCode::FORBIDDEN,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = match &self {
            ApiError::Hub(err) => (hub_error_status(err), err.code().to_string(), err.to_string(), err.field().map(str::to_string)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found".to_string(), msg.clone(), None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request".to_string(), msg.clone(), None),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    "an internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse { error: ErrorBody { code, message, field } };
        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("invalid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn duplicate_declaration_maps_to_409() {
        let error = ApiError::Hub(HubError::NonceReuse);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "nonce_reuse");
    }

    #[tokio::test]
    async fn validation_failure_maps_to_422() {
        let error = ApiError::Hub(HubError::validation_field("bad nonce", "nonce"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
