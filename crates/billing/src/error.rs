//! Billing error types

use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    /// The provider rejected or failed a call. The message is the provider's own.
    #[error("{0}")]
    Provider(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Webhook payload invalid: {0}")]
    WebhookPayloadInvalid(String),

    #[error("Unsigned webhooks are not accepted")]
    UnsignedWebhookRejected,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BillingError {
    /// Errors that came back from the provider API rather than from local state
    pub fn is_provider(&self) -> bool {
        matches!(self, BillingError::Provider(_))
    }

    /// Errors that mean the webhook could not be authenticated
    pub fn is_webhook_rejection(&self) -> bool {
        matches!(
            self,
            BillingError::WebhookSignatureInvalid
                | BillingError::WebhookPayloadInvalid(_)
                | BillingError::UnsignedWebhookRejected
        )
    }
}

impl From<stripe::StripeError> for BillingError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            // Surface the provider's message without the crate's wrapping
            stripe::StripeError::Stripe(request_error) => BillingError::Provider(
                request_error
                    .message
                    .unwrap_or_else(|| format!("Stripe request failed ({})", request_error.http_status)),
            ),
            other => BillingError::Provider(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_displays_message_verbatim() {
        let err = BillingError::Provider("No such price: 'price_bogus'".to_string());
        assert_eq!(err.to_string(), "No such price: 'price_bogus'");
        assert!(err.is_provider());
    }

    #[test]
    fn test_webhook_rejections_classified() {
        assert!(BillingError::WebhookSignatureInvalid.is_webhook_rejection());
        assert!(BillingError::UnsignedWebhookRejected.is_webhook_rejection());
        assert!(BillingError::WebhookPayloadInvalid("eof".into()).is_webhook_rejection());
        assert!(!BillingError::Database("down".into()).is_webhook_rejection());
    }
}
