//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,
    pub base_domain: String, // e.g., "example.com" for www.example.com routing
    pub allowed_subdomains: Vec<String>,
    pub allowed_origins: Vec<String>,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Billing is switched on by STRIPE_SECRET_KEY; the rest of the Stripe
    // settings are read by `launchkit_billing::StripeConfig`
    pub enable_billing: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            base_domain: env::var("BASE_DOMAIN")
                .unwrap_or_else(|_| "localhost".to_string())
                .trim()
                .to_lowercase(),
            allowed_subdomains: split_list(
                &env::var("ALLOWED_SUBDOMAINS").unwrap_or_else(|_| "www".to_string()),
            )
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect(),
            allowed_origins: split_list(&env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| {
                "http://localhost:3000,http://127.0.0.1:3000".to_string()
            })),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Billing
            enable_billing: env::var("STRIPE_SECRET_KEY")
                .map(|key| !key.trim().is_empty())
                .unwrap_or(false),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
