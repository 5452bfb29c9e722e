//! Session issuance and revocation flows.
//!
//! Registration, login and refresh mint a fresh token pair and overwrite the user's session
//! slots. Logout and any credential change revoke both slots so every device
//! has to sign in again.

use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::session_store::{SessionError, SessionStore};
use super::tokens::{TokenError, TokenPair, TokenService};
use crate::models::{NewUser, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email or password is incorrect, Please try again")]
    InvalidCredentials,

    #[error("Please provide a valid refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    tokens: Arc<TokenService>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(pool: PgPool, tokens: Arc<TokenService>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            pool,
            tokens,
            sessions,
        }
    }

    /// Mints a pair for `user` and makes it the only current one.
    pub async fn issue_session(&self, user: User) -> Result<IssuedSession, AuthError> {
        let tokens = self.tokens.issue_pair(&user)?;
        self.sessions
            .issue_pair(
                user.id,
                &tokens.access_token,
                tokens.access_ttl,
                &tokens.refresh_token,
                tokens.refresh_ttl,
            )
            .await?;

        Ok(IssuedSession { tokens, user })
    }

    pub async fn revoke_session(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.sessions.revoke_all(user_id).await?;
        Ok(())
    }

    /// Creates a customer account and signs it in.
    pub async fn register(&self, new_user: NewUser<'_>) -> Result<IssuedSession, AuthError> {
        let user = match User::create(&new_user, &self.pool).await {
            Ok(user) => user,
            Err(err) if is_email_conflict(&err) => return Err(AuthError::EmailAlreadyExists),
            Err(err) => return Err(err.into()),
        };

        info!(user_id = %user.id, "User registered");
        self.issue_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let user = User::find_by_credentials(email, password, &self.pool)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        info!(user_id = %user.id, "User logged in");
        self.issue_session(user).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedSession, AuthError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        if !self
            .sessions
            .validate_refresh(claims.user_id, refresh_token)
            .await
        {
            warn!(user_id = %claims.user_id, "Refresh token is no longer current");
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = User::find_by_id(claims.user_id, &self.pool)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.issue_session(user).await
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.revoke_session(user_id).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<User, AuthError> {
        let user = User::update_password(user_id, old_password, new_password, &self.pool)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.revoke_session(user_id).await?;
        info!(user_id = %user_id, "Password changed, session revoked");
        Ok(user)
    }

    pub async fn change_email(&self, user_id: Uuid, email: &str) -> Result<User, AuthError> {
        let user = match User::update_email(user_id, email, &self.pool).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::UserNotFound),
            Err(err) if is_email_conflict(&err) => return Err(AuthError::EmailAlreadyExists),
            Err(err) => return Err(err.into()),
        };

        self.revoke_session(user_id).await?;
        info!(user_id = %user_id, "Email changed, session revoked");
        Ok(user)
    }
}

fn is_email_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint().is_some_and(|name| name == "users_email_key")
        }
        _ => false,
    }
}
