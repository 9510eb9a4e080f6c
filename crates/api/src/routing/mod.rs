//! Host-based routing
//!
//! Only the base domain and the configured subdomains are served, e.g. with
//! `BASE_DOMAIN=example.com` and `ALLOWED_SUBDOMAINS=www`:
//! - example.com
//! - www.example.com

mod hosts;

pub use hosts::{require_known_host, HostMatch, HostPolicy, HostResolveError};
