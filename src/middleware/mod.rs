pub mod auth;

pub use auth::{AuthUser, BearerToken, RequireAdmin};
