//! Cross-origin policy from a comma-separated allow-list.

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// Build a CORS layer from a comma-separated origin allow-list.
/// An empty list disables CORS entirely: no layer, no headers, and
/// browsers block cross-origin reads by default.
pub fn cors_layer(allow_list: &str) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = allow_list
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            // Cookies ride on cross-origin requests, so credentials must
            // be allowed and origins can never be a wildcard.
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
