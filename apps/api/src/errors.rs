use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::parsing::ParseError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// User-facing messages stay terse; component detail goes to the log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("No extractable text after {attempts} extraction attempts")]
    NoExtractableText { attempts: usize },

    #[error("Analysis exceeded its {limit_secs}s deadline")]
    PipelineTimeout { limit_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedMediaType(media) => AppError::UnsupportedMediaType(media),
            ParseError::NoExtractableText { attempts } => AppError::NoExtractableText {
                attempts: attempts.len(),
            },
            ParseError::Workspace(e) => {
                AppError::Internal(anyhow::Error::new(e).context("parse workspace failure"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, suggestion) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::UnsupportedMediaType(media) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                format!("Files of type '{media}' cannot be analyzed"),
                Some("Upload a PDF, DOCX, TXT, HTML, PNG or JPEG file"),
            ),
            AppError::NoExtractableText { attempts } => {
                tracing::warn!("Extraction exhausted after {attempts} attempts");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "NO_EXTRACTABLE_TEXT",
                    "No readable text could be extracted from the uploaded file".to_string(),
                    Some("Try exporting your resume in a different file format"),
                )
            }
            AppError::PipelineTimeout { limit_secs } => {
                tracing::warn!("Analysis deadline of {limit_secs}s expired");
                (
                    StatusCode::REQUEST_TIMEOUT,
                    "ANALYSIS_TIMEOUT",
                    "Analysis timed out".to_string(),
                    Some("Retry using fast mode for quicker results"),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(suggestion) = suggestion {
            error["suggestion"] = json!(suggestion);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_408() {
        let response = AppError::PipelineTimeout { limit_secs: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_unsupported_media_maps_to_415() {
        let response = AppError::UnsupportedMediaType("application/zip".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_no_text_maps_to_422() {
        let response = AppError::NoExtractableText { attempts: 4 }.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_parse_error_conversion_counts_attempts() {
        let err: AppError = ParseError::NoExtractableText { attempts: vec![] }.into();
        assert!(matches!(err, AppError::NoExtractableText { attempts: 0 }));
    }
}
