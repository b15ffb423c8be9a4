// CORS configuration for browser callers of the relay routes.
//
// Allowed origins come from `GITGATE_CORS_ORIGINS` (comma-separated). When
// unset, only local development origins are allowed.

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::token_gate::AUTH_TOKEN_FIELD, error::REQUEST_ID_HEADER};

const DEFAULT_DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

const CORS_ORIGINS_ENV: &str = "GITGATE_CORS_ORIGINS";

/// Build a [`CorsLayer`] from the environment.
///
/// `"*"` allows any origin without credentials; a list allows exactly those
/// origins with credentials, so the session cookie can travel.
pub fn cors_layer() -> CorsLayer {
    cors_layer_from_env(std::env::var(CORS_ORIGINS_ENV).ok())
}

fn cors_layer_from_env(env_value: Option<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            auth_token_header(),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    match env_value.as_deref().map(str::trim) {
        Some("*") => base.allow_origin(AllowOrigin::any()).allow_credentials(false),
        Some(origins) => base.allow_origin(parse_origins(origins)),
        None => base.allow_origin(parse_origins(&DEFAULT_DEV_ORIGINS.join(","))),
    }
}

// Header names are stored lowercase.
fn auth_token_header() -> HeaderName {
    HeaderName::from_bytes(AUTH_TOKEN_FIELD.to_ascii_lowercase().as_bytes())
        .unwrap_or_else(|_| HeaderName::from_static("authtoken"))
}

fn parse_origins(comma_separated: &str) -> Vec<HeaderValue> {
    comma_separated
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect()
}
