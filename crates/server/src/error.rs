use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use proxima_common::ProximaError;
use tracing::{debug, error};

use crate::types::ErrorResponse;

/// Engine error rendered as `{"error": kind, "message": ...}`
#[derive(Debug)]
pub struct ApiError(pub ProximaError);

impl From<ProximaError> for ApiError {
    fn from(err: ProximaError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status.as_u16(), self.0);
        } else {
            debug!("Request rejected ({}): {}", status.as_u16(), self.0);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        })
    }
}
