//! Security headers middleware.
//!
//! Adds restrictive security headers to every response. Inline scripts are
//! only allowed with the per-request nonce from [`CspNonce`].

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;

/// Build the CSP for a response.
///
/// Product images are served by the backend's storage, which may live on
/// any HTTPS host, so `img-src` allows `https:`. The checkout form posts to
/// this site and VNPay is reached by redirect, so `form-action` stays
/// `'self'`.
#[must_use]
pub fn content_security_policy(nonce: Option<&str>) -> String {
    let script_src = nonce.filter(|n| !n.is_empty()).map_or_else(
        || "script-src 'self'".to_string(),
        |n| format!("script-src 'self' 'nonce-{n}'"),
    );

    [
        "default-src 'none'",
        script_src.as_str(),
        "style-src 'self'",
        "font-src 'self'",
        "img-src 'self' https: data:",
        "connect-src 'self'",
        "frame-src 'none'",
        "object-src 'none'",
        "base-uri 'self'",
        "form-action 'self'",
        "frame-ancestors 'none'",
    ]
    .join("; ")
}

/// Add security headers to all responses.
///
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: same-origin`
/// - `Content-Security-Policy` (see [`content_security_policy`])
/// - `Permissions-Policy` denying sensors, camera, microphone and payment APIs
/// - `Cache-Control: no-store` unless the handler set its own
/// - `Cross-Origin-Opener-Policy: same-origin`
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let csp = content_security_policy(
        response
            .extensions()
            .get::<CspNonce>()
            .map(CspNonce::value),
    );

    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("same-origin"));

    if let Ok(value) = HeaderValue::from_str(&csp) {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), camera=(), geolocation=(), gyroscope=(), \
             magnetometer=(), microphone=(), payment=(), usb=()",
        ),
    );

    // Pages carry cart and account data; static files set their own policy
    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_includes_nonce() {
        let csp = content_security_policy(Some("abc123"));
        assert!(csp.contains("script-src 'self' 'nonce-abc123'"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[test]
    fn test_policy_without_nonce() {
        let csp = content_security_policy(None);
        assert!(csp.contains("script-src 'self';"));
        assert!(!csp.contains("nonce-"));
        assert_eq!(content_security_policy(Some("")), csp);
    }
}
