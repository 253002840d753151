//! API error responses.
//!
//! Every failure leaves the service as `{"error": {"code", "message"}}`.
//! Database and internal details are logged and hidden from the client.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::{error_logging, AppError};
use crate::observability::metrics::record_error_metrics;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Application error carried to the HTTP boundary
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<crate::ocr_errors::OcrError> for ApiError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        ApiError(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::Validation(rejection.body_text()))
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError(AppError::Validation(rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError(AppError::Validation(format!("invalid multipart body: {}", err.body_text())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.0 {
            AppError::Validation(msg) => {
                error_logging::log_validation_error(&msg, "api_request", "request", None);
                record_error_metrics("validation", "api");
                (StatusCode::BAD_REQUEST, "VALIDATION", msg)
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream model failure");
                record_error_metrics("upstream", "api");
                (StatusCode::BAD_GATEWAY, "UPSTREAM", msg)
            }
            AppError::Ocr(msg) => {
                tracing::warn!(error = %msg, "OCR failure");
                record_error_metrics("ocr", "api");
                (StatusCode::BAD_GATEWAY, "OCR", msg)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "API database error");
                record_error_metrics("database", "api");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Config(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, "API internal error");
                record_error_metrics("internal", "api");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}
