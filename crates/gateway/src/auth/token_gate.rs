// Admission check in front of every relay route.
//
// Order: same-origin referer, session identity, then the caller's token
// against the `AccessToken` util record. The first check that passes admits
// the request.

use axum::{
    extract::{Request, State},
    http::{
        header::{HOST, ORIGIN, REFERER},
        uri::Authority,
        HeaderMap, Uri,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};
use url::Url;

use crate::{
    auth::session::Session,
    error::{ErrorCode, GatewayError},
    store::{UtilStore, ACCESS_TOKEN_UTIL_NAME},
};

/// Header and query parameter carrying the caller's access token.
pub const AUTH_TOKEN_FIELD: &str = "AuthToken";

/// Why a request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    SameOrigin,
    SessionIdentity,
    AccessToken,
}

impl Admission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameOrigin => "same_origin",
            Self::SessionIdentity => "session_identity",
            Self::AccessToken => "access_token",
        }
    }
}

pub async fn require_access_token(
    State(store): State<UtilStore>,
    request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<Session>().cloned().unwrap_or_default();

    match admit(&store, &session, request.headers(), request.uri()).await {
        Ok(admission) => {
            debug!(admission = admission.as_str(), "request admitted");
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

pub async fn admit(
    store: &UtilStore,
    session: &Session,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Admission, GatewayError> {
    if is_same_origin(headers, uri) {
        return Ok(Admission::SameOrigin);
    }

    if session.has_identity() {
        return Ok(Admission::SessionIdentity);
    }

    let candidate = candidate_token(session, headers, uri);

    let canonical = match store.get(ACCESS_TOKEN_UTIL_NAME).await {
        Ok(Some(value)) if !value.trim().is_empty() => value,
        Ok(_) => {
            error!(util = ACCESS_TOKEN_UTIL_NAME, "access token record is not defined");
            return Err(GatewayError::from_code(ErrorCode::AccessTokenNotConfigured));
        }
        Err(lookup_error) => {
            error!(util = ACCESS_TOKEN_UTIL_NAME, error = %lookup_error, "access token lookup failed");
            return Err(GatewayError::from_code(ErrorCode::AccessTokenNotConfigured));
        }
    };

    match candidate {
        Some(candidate) if constant_time_eq(candidate.as_bytes(), canonical.as_bytes()) => {
            Ok(Admission::AccessToken)
        }
        candidate => {
            warn!(token_present = candidate.is_some(), "rejecting request with invalid access token");
            Err(GatewayError::from_code(ErrorCode::AuthInvalidToken))
        }
    }
}

/// True when the referer (or origin) names the host the request was sent
/// to. Ports are ignored.
fn is_same_origin(headers: &HeaderMap, uri: &Uri) -> bool {
    let Some(target_host) = request_host(headers, uri) else {
        return false;
    };

    let source = headers
        .get(REFERER)
        .or_else(|| headers.get(ORIGIN))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Url::parse(value.trim()).ok());

    match source.as_ref().and_then(Url::host_str) {
        Some(source_host) => source_host.eq_ignore_ascii_case(&target_host),
        None => false,
    }
}

fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<Authority>().ok())
        .map(|authority| authority.host().to_owned());

    from_header
        .or_else(|| uri.host().map(ToOwned::to_owned))
        .filter(|host| !host.is_empty())
}

/// First non-blank token among the session, the `AuthToken` header and the
/// `AuthToken` query parameter. Whitespace only decides blankness; the
/// token itself is returned as sent and must match the record byte for byte.
fn candidate_token(session: &Session, headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(token) = session.auth_token() {
        return Some(token.to_owned());
    }

    let from_header = headers
        .get(AUTH_TOKEN_FIELD)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty());
    if let Some(token) = from_header {
        return Some(token.to_owned());
    }

    uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, value)| name == AUTH_TOKEN_FIELD && !value.trim().is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
