//! HTTP error mapping.
//!
//! Every failure leaves the router as `{"msg": "..."}` with a status code
//! derived from the error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use orderdesk_core::StoreError;
use serde_json::json;

/// Failure of a route handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Supplied x-secret code not valid")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                "event=http_error module=http status=error code={} error={}",
                status.as_u16(),
                self
            );
        } else {
            warn!(
                "event=http_reject module=http status=rejected code={} reason={}",
                status.as_u16(),
                self
            );
        }

        (status, Json(json!({ "msg": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use orderdesk_core::StoreError;

    #[test]
    fn error_kinds_map_to_status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::InvalidFilter("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
