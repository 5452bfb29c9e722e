use axum::{extract::State, response::Response};
use serde::{Deserialize, Serialize};

use super::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::models::{NewUser, User};
use crate::services::IssuedSession;
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};
use crate::utils::{AppError, FieldErrors, Validate};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 50;
const NAME_MAX: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", &self.email);
        errors.check_text("password", &self.password, PASSWORD_MIN, PASSWORD_MAX);
        errors.check_text("first_name", &self.first_name, 1, NAME_MAX);
        errors.check_text("last_name", &self.last_name, 1, NAME_MAX);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", &self.email);
        errors.check_text("password", &self.password, PASSWORD_MIN, PASSWORD_MAX);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.refresh_token.trim().is_empty() {
            errors.add("refresh_token", "please enter your refresh token");
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check_text("old_password", &self.old_password, PASSWORD_MIN, PASSWORD_MAX);
        errors.check_text("new_password", &self.new_password, PASSWORD_MIN, PASSWORD_MAX);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    #[serde(default)]
    pub email: String,
}

impl Validate for ChangeEmailRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", &self.email);
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: User,
}

impl From<IssuedSession> for AuthResponse {
    fn from(session: IssuedSession) -> Self {
        Self {
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            token_type: "Bearer",
            expires_in: session.tokens.access_ttl.as_secs(),
            user: session.user,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Response, AppError> {
    let session = state
        .auth
        .register(NewUser {
            email: request.email.trim(),
            password: &request.password,
            first_name: request.first_name.trim(),
            last_name: request.last_name.trim(),
        })
        .await?;

    Ok(created(AuthResponse::from(session), "Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let session = state
        .auth
        .login(request.email.trim(), &request.password)
        .await?;

    Ok(success(AuthResponse::from(session), "Login successful"))
}

pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Response, AppError> {
    let session = state.auth.refresh(request.refresh_token.trim()).await?;

    Ok(success(
        AuthResponse::from(session),
        "Token refreshed successfully",
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    state.auth.logout(user.user_id).await?;
    Ok(empty_success("Logout successful"))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    state
        .auth
        .change_password(user.user_id, &request.old_password, &request.new_password)
        .await?;

    Ok(empty_success(
        "Password changed successfully, please login again",
    ))
}

pub async fn change_email(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<ChangeEmailRequest>,
) -> Result<Response, AppError> {
    let updated = state
        .auth
        .change_email(user.user_id, request.email.trim())
        .await?;

    Ok(success(
        updated,
        "Email changed successfully, please login again",
    ))
}
