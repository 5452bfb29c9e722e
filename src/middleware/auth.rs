//! Request-boundary authentication.
//!
//! Protected handlers take [`AuthUser`] (any signed-in user) or
//! [`RequireAdmin`] as a parameter. Verification runs in two phases:
//!
//! 1. The access token's signature and expiry are checked locally. Nothing
//!    touches the session store if this fails.
//! 2. The token must still be the one held in the user's access slot. A
//!    logout, credential change or newer login replaces or deletes the slot,
//!    so an older token is rejected here even though it is still signed and
//!    unexpired.
//!
//! Role and identity come from the token claims and are not re-read from the
//! user record. A role change takes effect once the current token expires or
//! the session is revoked.

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use tracing::debug;
use uuid::Uuid;

use crate::models::Role;
use crate::services::TokenError;
use crate::state::AppState;
use crate::utils::AppError;

const BEARER_PREFIX: &str = "Bearer ";

/// Raw token from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::LoginRequired)?;

        let token = value
            .to_str()
            .ok()
            .and_then(|raw| raw.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::InvalidAccessToken)?;

        Ok(Self(token.to_string()))
    }
}

/// An authenticated caller whose access token is current.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Role gate against a route's allow-list.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            debug!(user_id = %self.user_id, role = %self.role, "Role not permitted");
            Err(AppError::InsufficientPermissions)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        let claims = state.tokens.verify_access(&token).map_err(|err| match err {
            TokenError::Expired => AppError::SessionExpired,
            _ => AppError::InvalidAccessToken,
        })?;

        if !state.sessions.validate_access(claims.user_id, &token).await {
            debug!(user_id = %claims.user_id, "Access token is no longer current");
            return Err(AppError::SessionExpired);
        }

        Ok(Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_role(&[Role::Admin])?;
        Ok(Self(user))
    }
}
