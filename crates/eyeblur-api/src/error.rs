//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eyeblur_media::MediaError;
use eyeblur_models::ErrorBody;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

pub const NO_SOURCE: &str = "No source type or path/URL provided";
pub const INVALID_SOURCE_TYPE: &str = "Invalid source type";
pub const LOCAL_FILE_NOT_FOUND: &str = "Local file not found";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("An internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FileNotFound(_) => ApiError::bad_request(LOCAL_FILE_NOT_FOUND),
            MediaError::VideoOpen { .. } => ApiError::Unprocessable(err.to_string()),
            MediaError::Acquisition { .. } => ApiError::BadGateway(err.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
