//! HTTP error responses: `LeadportError` to status code plus a
//! `{ "error": "<message>" }` body.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use leadport_core::error::LeadportError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    error: LeadportError,
    retry_after: Option<Duration>,
}

impl ApiError {
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            error: LeadportError::RateLimited,
            retry_after: Some(retry_after),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            LeadportError::Validation { .. } => StatusCode::BAD_REQUEST,
            LeadportError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            LeadportError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            LeadportError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            LeadportError::NotFound { .. } => StatusCode::NOT_FOUND,
            LeadportError::AlreadyExists { .. } | LeadportError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            LeadportError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            LeadportError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            LeadportError::Database(_) | LeadportError::Crypto(_) | LeadportError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Server-side details stay in the logs.
    pub fn message(&self) -> String {
        match &self.error {
            LeadportError::NotFound { entity, .. } => format!("{entity} not found"),
            LeadportError::AlreadyExists { entity } => format!("{entity} already exists"),
            LeadportError::Conflict { reason }
            | LeadportError::AuthenticationFailed { reason }
            | LeadportError::AuthorizationDenied { reason }
            | LeadportError::PaymentDeclined { reason } => reason.clone(),
            LeadportError::Validation { message } => message.clone(),
            LeadportError::RateLimited => "too many requests".into(),
            LeadportError::PaymentProvider(_) => "payment provider unavailable".into(),
            LeadportError::Database(_) | LeadportError::Crypto(_) | LeadportError::Internal(_) => {
                "internal server error".into()
            }
        }
    }
}

impl From<LeadportError> for ApiError {
    fn from(error: LeadportError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.error, "Request failed");
        }

        let mut response = (status, Json(json!({ "error": self.message() }))).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let secs = self.retry_after.map_or(60, |d| d.as_secs_f64().ceil().max(1.0) as u64);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: LeadportError) -> StatusCode {
        ApiError::from(error).status()
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(status_of(LeadportError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(LeadportError::not_found("lead", "1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(LeadportError::conflict("x")), StatusCode::CONFLICT);
        assert_eq!(
            status_of(LeadportError::AlreadyExists {
                entity: "invoice".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(LeadportError::forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(LeadportError::PaymentDeclined { reason: "x".into() }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(LeadportError::PaymentProvider("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(LeadportError::Database("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::from(LeadportError::Database("connection reset by peer".into()));
        assert_eq!(err.message(), "internal server error");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(Duration::from_millis(14_200)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "15");
    }
}
