#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Launchkit API Library
//!
//! HTTP surface of the billing service: configuration, session auth, host
//! routing, and the billing/admin/health routes.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod routing;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routing::{HostMatch, HostPolicy};
pub use state::AppState;
