//! Mapping of domain errors to HTTP responses.

use crate::catalog::CatalogError;
use crate::upload::UploadError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

#[derive(Debug)]
pub enum ApiError {
    Catalog(CatalogError),
    Upload(UploadError),
    /// Unusable request shape: bad JSON, non-numeric id, missing parameter.
    BadRequest(String),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Upload(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, message),
            ApiError::Catalog(CatalogError::Validation(message)) => {
                error_response(StatusCode::BAD_REQUEST, message)
            }
            ApiError::Catalog(err @ CatalogError::NotFound { .. }) => {
                error_response(StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Catalog(CatalogError::Backend(err)) => {
                error!("Backend failure: {:#}", err);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            ApiError::Upload(err @ UploadError::Io(_)) => {
                error!("Upload failed: {}", err);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Upload failed: {}", err),
                )
            }
            ApiError::Upload(err @ UploadError::TooLarge(_)) => {
                warn!("Rejected upload: {}", err);
                error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("Upload failed: {}", err),
                )
            }
            ApiError::Upload(err) => {
                warn!("Rejected upload: {}", err);
                error_response(StatusCode::BAD_REQUEST, format!("Upload failed: {}", err))
            }
        }
    }
}
