//! Registry errors as HTTP responses: `{ "message", "code" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scriptd_registry::{ErrorKind, RegistryError};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError(pub RegistryError);

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self(e)
    }
}

impl ApiError {
    /// A 400 for malformed requests caught before reaching the registry.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(RegistryError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::LaunchFailure | ErrorKind::IoFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            warn!(code = self.0.code(), error = %self.0, "request rejected");
        }
        let body = Json(json!({
            "message": self.0.to_string(),
            "code": self.0.code(),
        }));
        (status, body).into_response()
    }
}
