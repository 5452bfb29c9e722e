//! Session revocation store.
//!
//! One slot per user per token kind holds the single token of that kind that
//! is currently honoured. Issuing a pair overwrites both slots, so the previous
//! pair stops validating immediately. Revoking deletes both slots.
//!
//! Keys are `access:<user_id>` and `refresh:<user_id>`, with the token's
//! lifetime as the key TTL. Any failure to reach the store while validating
//! reads as "not current".

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn prefix(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

pub fn session_key(kind: TokenKind, user_id: Uuid) -> String {
    format!("{}:{user_id}", kind.prefix())
}

/// Compares a presented token with the stored one in constant time.
fn token_matches(stored: &str, presented: &str) -> bool {
    constant_time_eq::constant_time_eq(stored.as_bytes(), presented.as_bytes())
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable")]
    Redis(#[from] redis::RedisError),

    #[error("session store unavailable")]
    Unavailable,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Overwrites both slots for `user_id`.
    async fn issue_pair(
        &self,
        user_id: Uuid,
        access_token: &str,
        access_ttl: Duration,
        refresh_token: &str,
        refresh_ttl: Duration,
    ) -> Result<(), SessionError>;

    /// True iff the slot exists, has not expired, and holds exactly `token`.
    async fn validate(&self, kind: TokenKind, user_id: Uuid, token: &str) -> bool;

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionError>;

    async fn validate_access(&self, user_id: Uuid, token: &str) -> bool {
        self.validate(TokenKind::Access, user_id, token).await
    }

    async fn validate_refresh(&self, user_id: Uuid, token: &str) -> bool {
        self.validate(TokenKind::Refresh, user_id, token).await
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[derive(Clone)]
pub struct RedisSessionStore {
    conn_manager: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str) -> Result<Self, SessionError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        info!("Session store connected to Redis");

        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn issue_pair(
        &self,
        user_id: Uuid,
        access_token: &str,
        access_ttl: Duration,
        refresh_token: &str,
        refresh_ttl: Duration,
    ) -> Result<(), SessionError> {
        let mut conn = self.conn_manager.clone();

        // MULTI/EXEC so a reader never sees a new access token next to an old
        // refresh token.
        let _: () = redis::pipe()
            .atomic()
            .set_ex(session_key(TokenKind::Access, user_id), access_token, ttl_secs(access_ttl))
            .ignore()
            .set_ex(session_key(TokenKind::Refresh, user_id), refresh_token, ttl_secs(refresh_ttl))
            .ignore()
            .query_async(&mut conn)
            .await?;

        info!(user_id = %user_id, "Session issued");
        Ok(())
    }

    async fn validate(&self, kind: TokenKind, user_id: Uuid, token: &str) -> bool {
        let mut conn = self.conn_manager.clone();

        let stored: Result<Option<String>, redis::RedisError> =
            conn.get(session_key(kind, user_id)).await;
        match stored {
            Ok(Some(stored)) => token_matches(&stored, token),
            Ok(None) => false,
            Err(err) => {
                error!(
                    user_id = %user_id,
                    kind = kind.prefix(),
                    error = %err,
                    "Session store unreachable, rejecting token"
                );
                false
            }
        }
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionError> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .del(vec![
                session_key(TokenKind::Access, user_id),
                session_key(TokenKind::Refresh, user_id),
            ])
            .await?;

        info!(user_id = %user_id, "Session revoked");
        Ok(())
    }
}

/// Process-local store with the same slot semantics, for tests and for
/// running without Redis. Expiry follows `tokio::time`, so paused-clock tests
/// can advance past a TTL.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    slots: Arc<Mutex<HashMap<(TokenKind, Uuid), (String, Instant)>>>,
    offline: Arc<AtomicBool>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the backing store: writes fail and nothing validates.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn issue_pair(
        &self,
        user_id: Uuid,
        access_token: &str,
        access_ttl: Duration,
        refresh_token: &str,
        refresh_ttl: Duration,
    ) -> Result<(), SessionError> {
        if self.is_offline() {
            return Err(SessionError::Unavailable);
        }

        let now = Instant::now();
        let mut slots = self.slots.lock().map_err(|_| SessionError::Unavailable)?;
        slots.insert(
            (TokenKind::Access, user_id),
            (access_token.to_string(), now + access_ttl),
        );
        slots.insert(
            (TokenKind::Refresh, user_id),
            (refresh_token.to_string(), now + refresh_ttl),
        );
        Ok(())
    }

    async fn validate(&self, kind: TokenKind, user_id: Uuid, token: &str) -> bool {
        if self.is_offline() {
            return false;
        }

        let Ok(slots) = self.slots.lock() else {
            return false;
        };
        match slots.get(&(kind, user_id)) {
            Some((stored, expires_at)) => Instant::now() < *expires_at && token_matches(stored, token),
            None => false,
        }
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionError> {
        if self.is_offline() {
            return Err(SessionError::Unavailable);
        }

        let mut slots = self.slots.lock().map_err(|_| SessionError::Unavailable)?;
        slots.remove(&(TokenKind::Access, user_id));
        slots.remove(&(TokenKind::Refresh, user_id));
        Ok(())
    }
}
