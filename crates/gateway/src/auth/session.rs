use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, bail, Context};
use axum::{
    extract::{Request, State},
    http::{header::COOKIE, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SESSION_COOKIE: &str = "GITGATE_SESSION";
pub const SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const MIN_SECRET_BYTES: usize = 32;

/// Per-request view of the caller's web session. Empty when the request
/// carries no valid session cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identity marker set once the user has logged in to the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Session {
    pub fn has_identity(&self) -> bool {
        non_blank(self.identity.as_deref()).is_some()
    }

    /// The stored token, unmodified. Blank counts as absent.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|token| !token.trim().is_empty())
    }

    pub fn user_name(&self) -> Option<&str> {
        non_blank(self.user_name.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    session: Session,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session cookies (HS256).
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionService {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        if secret.len() < MIN_SECRET_BYTES {
            bail!("session secret must be at least {MIN_SECRET_BYTES} bytes long");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn issue(&self, session: &Session) -> anyhow::Result<String> {
        self.issue_at(session, current_unix_timestamp()?)
    }

    fn issue_at(&self, session: &Session, issued_at: i64) -> anyhow::Result<String> {
        let claims = SessionClaims {
            session: session.clone(),
            iat: issued_at,
            exp: issued_at + SESSION_TTL_SECONDS,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to encode session cookie")
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Session> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .context("failed to decode session cookie")?
            .claims;

        Ok(claims.session)
    }

    /// Session carried by `headers`, or an empty session when the cookie is
    /// absent, tampered with, or expired.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Session {
        let Some(token) = session_cookie(headers) else {
            return Session::default();
        };

        match self.verify(token) {
            Ok(session) => session,
            Err(error) => {
                debug!(error = %error, "ignoring invalid session cookie");
                Session::default()
            }
        }
    }
}

/// Resolves the caller's [`Session`] and stores it in request extensions.
pub async fn load_session(
    State(sessions): State<Arc<SessionService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = sessions.session_from_headers(request.headers());
    request.extensions_mut().insert(session);

    next.run(request).await
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn current_unix_timestamp() -> anyhow::Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|error| anyhow!("system clock is before unix epoch: {error}"))?;

    i64::try_from(duration.as_secs()).context("unix timestamp overflow")
}
