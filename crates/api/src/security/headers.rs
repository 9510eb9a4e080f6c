//! Security headers middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, Response},
    middleware::Next,
};

/// Which optional headers to send
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeaders {
    /// Send Strict-Transport-Security; only meaningful behind HTTPS
    pub hsts: bool,
}

impl SecurityHeaders {
    /// HSTS on when the public URL is served over HTTPS
    pub fn for_public_url(public_url: &str) -> Self {
        Self {
            hsts: public_url.starts_with("https://"),
        }
    }
}

/// Middleware that adds security headers to all responses
pub async fn security_headers_middleware(
    State(settings): State<SecurityHeaders>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=(), payment=()"),
    );

    if settings.hsts {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    // Billing state is per-account; never let a shared cache keep it
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, private"));
    }

    response
}
