use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fp_core::envelope::{ErrorBody, LOGGED_OUT};
use fp_core::Error;
use tracing::{error, warn};

/// Maps core errors onto the response envelope.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::SessionExpired => StatusCode::UNAUTHORIZED,
            Error::VersionConflict { .. } => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) | Error::Serialization(_) | Error::Template(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            Error::SessionExpired => return (status, Json(LOGGED_OUT)).into_response(),
            Error::VersionConflict { .. } => warn!("⚠️ {}", self.0),
            e if status.is_server_error() => error!("❌ Request failed: {}", e),
            _ => {}
        }
        (status, Json(ErrorBody::from_error(&self.0))).into_response()
    }
}
