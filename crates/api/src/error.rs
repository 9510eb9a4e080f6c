//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use launchkit_billing::BillingError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Client errors
    /// Message is passed through verbatim, including Stripe's own wording
    #[error("{0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    // Webhooks
    #[error("Invalid signature")]
    InvalidSignature,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Client errors
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),

            // Webhooks
            ApiError::InvalidSignature => (StatusCode::FORBIDDEN, "INVALID_SIGNATURE", self.to_string()),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
            ApiError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Provider(msg) | BillingError::InvalidInput(msg) => ApiError::BadRequest(msg),
            BillingError::WebhookSignatureInvalid
            | BillingError::WebhookPayloadInvalid(_)
            | BillingError::UnsignedWebhookRejected => ApiError::InvalidSignature,
            BillingError::CustomerNotFound(_) => ApiError::NotFound,
            BillingError::Database(msg) => {
                tracing::error!(error = %msg, "Billing store error");
                ApiError::Database(msg)
            }
            BillingError::Config(msg) => {
                tracing::error!(error = %msg, "Billing configuration error");
                ApiError::Internal
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_is_bad_request_with_message() {
        let err: ApiError = BillingError::Provider("No such customer: 'cus_x'".to_string()).into();
        assert_eq!(err.to_string(), "No such customer: 'cus_x'");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_webhook_rejections_are_forbidden() {
        for billing_err in [
            BillingError::WebhookSignatureInvalid,
            BillingError::UnsignedWebhookRejected,
            BillingError::WebhookPayloadInvalid("eof".to_string()),
        ] {
            let err: ApiError = billing_err.into();
            assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_missing_customer_is_not_found() {
        let err: ApiError = BillingError::CustomerNotFound("acct".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_database_error_hides_details() {
        let err: ApiError = BillingError::Database("relation does not exist".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
