use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::errors::ServiceError;
use thiserror::Error;
use tracing::error;

/// JSON error body: `{"error": <title>, "detail": <message?>}`.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub detail: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, error: &'static str, detail: Option<String>) -> Self {
        Self { status, error, detail }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", Some(detail.into()))
    }

    pub fn not_found(key: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", Some(format!("key `{key}` not found")))
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, "Validation Error", Some(msg)),
            ServiceError::Unsupported(msg) => Self::new(StatusCode::BAD_REQUEST, "Unsupported Operation", Some(msg)),
            // store detail is exposed for debugging; not suitable for public deployments
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", Some(other.to_string())),
        }
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = ?self.detail, "request failed");
        }
        let body = match self.detail {
            Some(detail) => serde_json::json!({"error": self.error, "detail": detail}),
            None => serde_json::json!({"error": self.error}),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("backing store unavailable: {0}")]
    Store(#[from] ServiceError),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status() {
        let cases = [
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unsupported("off".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Store("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(JsonApiError::from(err).status, status);
        }
    }

    #[test]
    fn store_detail_is_kept() {
        let e = JsonApiError::from(ServiceError::Store("disk full".into()));
        assert_eq!(e.detail.as_deref(), Some("store error: disk full"));
    }
}
