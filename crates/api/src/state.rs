//! Application state

use launchkit_billing::BillingService;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    auth::{AuthState, JwtManager},
    config::Config,
    error::{ApiError, ApiResult},
    routing::HostPolicy,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt_manager: JwtManager,
    /// Billing service; `None` when Stripe is not configured
    pub billing: Option<Arc<BillingService>>,
    pub host_policy: Arc<HostPolicy>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        // Try to initialize billing if Stripe env vars are set
        let billing = if config.enable_billing {
            match BillingService::from_env(pool.clone()) {
                Ok(svc) => {
                    tracing::info!(
                        prices = svc.config().price_ids.len(),
                        "Stripe billing service initialized"
                    );
                    Some(Arc::new(svc))
                }
                Err(e) => {
                    tracing::warn!("Stripe billing not configured: {}", e);
                    None
                }
            }
        } else {
            tracing::warn!("Billing disabled (STRIPE_SECRET_KEY not set)");
            None
        };

        Self::with_billing(pool, config, billing)
    }

    /// Build state around an already constructed billing service
    pub fn with_billing(pool: PgPool, config: Config, billing: Option<Arc<BillingService>>) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);

        let host_policy = Arc::new(HostPolicy::new(&config.base_domain, &config.allowed_subdomains));
        tracing::info!(
            base_domain = %config.base_domain,
            subdomains = ?config.allowed_subdomains,
            "Host routing initialized"
        );

        Self {
            pool,
            config,
            jwt_manager,
            billing,
            host_policy,
        }
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
        }
    }

    /// Billing service, or 503 when billing is off
    pub fn billing(&self) -> ApiResult<&BillingService> {
        self.billing.as_deref().ok_or(ApiError::ServiceUnavailable)
    }
}
