//! HTTP error responses for the web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::BandtraderError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &BandtraderError) -> StatusCode {
    match err {
        BandtraderError::ConfigMissing { .. }
        | BandtraderError::ConfigInvalid { .. }
        | BandtraderError::ConfigParse { .. }
        | BandtraderError::UnknownInterval(_) => StatusCode::BAD_REQUEST,
        BandtraderError::InsufficientData { .. } | BandtraderError::CalcFailure { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BandtraderError::FetchFailure { .. } => StatusCode::BAD_GATEWAY,
        BandtraderError::InvalidPosition { .. } | BandtraderError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<BandtraderError> for WebError {
    fn from(err: BandtraderError) -> Self {
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "status": self.status.as_u16(),
        });
        (self.status, Json(body)).into_response()
    }
}
