use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{AuthService, CodeGenerator, OrderService, SessionStore, TokenService};

/// Shared handles injected into every handler and extractor.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub auth: AuthService,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        tokens: TokenService,
        sessions: Arc<dyn SessionStore>,
        codes: Arc<dyn CodeGenerator>,
        lock_timeout: std::time::Duration,
    ) -> Self {
        let tokens = Arc::new(tokens);
        Self {
            orders: OrderService::new(pool.clone(), codes, lock_timeout),
            auth: AuthService::new(pool, tokens.clone(), sessions.clone()),
            tokens,
            sessions,
        }
    }
}
