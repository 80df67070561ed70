//! Account registration, login and session resolution.

mod password;
mod token;

use std::sync::LazyLock;

use regex::Regex;
use store::{Account, AccountDirectory, NewAccount, StoreError};
use thiserror::Error;

use crate::SessionContext;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// A required form field was absent or blank.
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("This account already exists")]
    AccountExists,

    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("Incorrect Email or Password")]
    InvalidCredentials,

    /// No session, or a session token no account holds.
    #[error("Missing or invalid session Id")]
    Unauthenticated,

    #[error("Failed to hash password")]
    PasswordHash,

    /// Could not find an unused session token.
    #[error("Failed to generate a session token")]
    TokenGeneration,

    #[error("Account store error: {0}")]
    Store(#[from] StoreError),
}

/// A freshly authenticated account and the session token it now holds.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub account: Account,
    pub session_token: String,
}

/// Service for account and session operations.
pub struct AccountService<A: AccountDirectory> {
    directory: A,
}

impl<A: AccountDirectory> AccountService<A> {
    /// Creates a new account service over the given directory.
    pub fn new(directory: A) -> Self {
        Self { directory }
    }

    /// Registers a new account and logs it in.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoggedIn, AccountError> {
        let email = required(email, "email")?;
        let password = required(password, "password")?;

        if self.directory.find_by_email(email).await?.is_some() {
            return Err(AccountError::AccountExists);
        }
        validate_email(email)?;

        let password_hash = password::hash(password)?;
        let session_token = self.unused_token().await?;

        let account = self
            .directory
            .insert_account(NewAccount {
                email: email.to_string(),
                password_hash,
                address: None,
                session_token: Some(session_token.clone()),
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail(_) => AccountError::AccountExists,
                other => AccountError::Store(other),
            })?;

        tracing::info!(account_id = %account.id, "account created");
        Ok(LoggedIn {
            account,
            session_token,
        })
    }

    /// Checks credentials and issues a fresh session token.
    ///
    /// Any earlier token of the account stops working.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoggedIn, AccountError> {
        let email = required(email, "email")?;
        let password = required(password, "password")?;
        validate_email(email)?;

        let mut account = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        password::verify(password, &account.password_hash)?;

        let session_token = self.unused_token().await?;
        self.directory
            .set_session_token(account.id, Some(&session_token))
            .await?;
        account.session_token = Some(session_token.clone());

        tracing::info!(account_id = %account.id, "logged in");
        Ok(LoggedIn {
            account,
            session_token,
        })
    }

    /// Ends the caller's session.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self, session: &SessionContext) -> Result<(), AccountError> {
        self.directory
            .set_session_token(session.account_id(), None)
            .await?;
        Ok(())
    }

    /// Resolves a session token into a request context.
    ///
    /// A missing or blank token, or one no account holds, yields `None`.
    pub async fn resolve_session(
        &self,
        token: Option<&str>,
    ) -> Result<Option<SessionContext>, AccountError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        Ok(self
            .directory
            .resolve(token)
            .await?
            .map(SessionContext::new))
    }

    /// Returns the account holding `token`, if any.
    pub async fn current_account(&self, token: Option<&str>) -> Result<Option<Account>, AccountError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        Ok(self.directory.find_by_session(token).await?)
    }

    async fn unused_token(&self) -> Result<String, AccountError> {
        for _ in 0..token::MAX_ATTEMPTS {
            let candidate = token::generate();
            if self.directory.find_by_session(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            tracing::warn!("session token collision, regenerating");
        }
        Err(AccountError::TokenGeneration)
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, AccountError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(AccountError::MissingField(field))
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AccountError::InvalidEmail)
    }
}
