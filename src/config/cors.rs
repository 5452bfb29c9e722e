use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// `origins` is the raw comma separated list; `None` falls back to the local
/// development origins.
pub fn create_cors_layer(origins: Option<&str>) -> CorsLayer {
    let allowed = parse_origins(origins.unwrap_or(DEFAULT_ALLOWED_ORIGINS));

    let allow_origin = if allowed.is_empty() {
        tracing::warn!("CORS: no valid origins configured, allowing any origin");
        AllowOrigin::any()
    } else {
        tracing::info!(origins = allowed.len(), "CORS: configured allowed origins");
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "CORS: skipping invalid origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origins_are_valid() {
        assert_eq!(parse_origins(DEFAULT_ALLOWED_ORIGINS).len(), 2);
    }

    #[test]
    fn blank_and_invalid_entries_are_skipped() {
        let origins = parse_origins(" https://tickets.example.com, ,bad\norigin");
        assert_eq!(origins, vec![HeaderValue::from_static("https://tickets.example.com")]);
    }

    #[test]
    fn layer_builds_from_configured_origins() {
        let _layer = create_cors_layer(Some("https://tickets.example.com"));
        let _fallback = create_cors_layer(None);
    }
}
