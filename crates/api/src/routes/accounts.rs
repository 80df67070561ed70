//! Account and session endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use domain::AccountError;
use serde::{Deserialize, Serialize};
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::extract::ApiForm;
use crate::session::{CurrentSession, SessionCookie, expired_session_cookie, session_cookie};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// GET /: whether the session cookie belongs to an account.
pub async fn status<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    SessionCookie(token): SessionCookie,
) -> Result<Json<SessionStatus>, ApiError> {
    let account = state.accounts.current_account(token.as_deref()).await?;
    Ok(Json(SessionStatus {
        logged_in: account.is_some(),
        email: account.map(|account| account.email),
    }))
}

/// POST /new/account: register and start a session.
#[tracing::instrument(skip_all)]
pub async fn register<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiForm(credentials): ApiForm<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let logged_in = state
        .accounts
        .register(credentials.email.as_deref(), credentials.password.as_deref())
        .await?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&logged_in.session_token, state.session_max_age_secs),
        )]),
        "account successfully created",
    ))
}

/// POST /login: check credentials and rotate the session.
#[tracing::instrument(skip_all)]
pub async fn login<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiForm(credentials): ApiForm<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let logged_in = state
        .accounts
        .login(credentials.email.as_deref(), credentials.password.as_deref())
        .await?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&logged_in.session_token, state.session_max_age_secs),
        )]),
        "Logged In",
    ))
}

/// POST /logout: end the caller's session and expire the cookie.
#[tracing::instrument(skip_all)]
pub async fn logout<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
) -> Result<impl IntoResponse, ApiError> {
    let session = session.ok_or(AccountError::Unauthenticated)?;
    state.accounts.logout(&session).await?;

    Ok((
        AppendHeaders([(SET_COOKIE, expired_session_cookie())]),
        "Logged Out",
    ))
}
