//! Security response headers.
//!
//! Added to every response unless the handler already set them. The content
//! security policy is dropped when XSS prevention is disabled for development.

use axum::{
    http::{header, HeaderName, HeaderValue},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

const CSP: &str = "default-src 'none'; img-src 'self' data:; font-src 'self'; \
                   style-src 'self'; script-src 'self'; connect-src 'self' wss:; \
                   form-action 'none'; frame-ancestors 'none'; object-src 'none'; \
                   base-uri 'none'";

fn fixed() -> [(HeaderName, &'static str); 6] {
    [
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubdomains; preload",
        ),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::PRAGMA, "no-cache"),
        (header::CACHE_CONTROL, "no-store, max-age=0"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_XSS_PROTECTION, "1; mode=block"),
    ]
}

/// Wrap `router` with the security header layers.
pub fn apply(mut router: Router, xss_prevention: bool) -> Router {
    for (name, value) in fixed() {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ));
    }
    if xss_prevention {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CSP),
        ));
    }
    router
}
