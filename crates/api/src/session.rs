//! Session cookie extractors.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use domain::SessionContext;
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionId";

/// The raw `sessionId` cookie value, if the request carries one.
pub struct SessionCookie(pub Option<String>);

impl<St> FromRequestParts<St> for SessionCookie
where
    St: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        Ok(Self(session_token(&parts.headers)))
    }
}

/// The caller resolved from the `sessionId` cookie.
///
/// `None` when the cookie is absent or names no account; handlers decide
/// whether that is an error.
pub struct CurrentSession(pub Option<SessionContext>);

impl<S: MarketplaceStore> FromRequestParts<Arc<AppState<S>>> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers);
        let session = state.accounts.resolve_session(token.as_deref()).await?;
        Ok(Self(session))
    }
}

/// Finds the session token among the request's `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value that stores `token` for `max_age_secs`.
pub fn session_cookie(token: &str, max_age_secs: u64) -> HeaderValue {
    cookie_header(&format!(
        "{SESSION_COOKIE}={token}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax"
    ))
}

/// `Set-Cookie` value that expires the session cookie.
pub fn expired_session_cookie() -> HeaderValue {
    cookie_header(&format!(
        "{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"
    ))
}

fn cookie_header(value: &str) -> HeaderValue {
    // Tokens are hex, so the value is always visible ASCII
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}
