//! Session issuance and revocation against real Redis and Postgres.
//!
//! Docker must be running: `cargo test -- --ignored`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::seed_user;
use ticket_server::models::{NewUser, Role};
use ticket_server::services::{
    AuthError, AuthService, RedisSessionStore, SessionStore, TokenService,
};
use uuid::Uuid;

const HOUR: Duration = Duration::from_secs(3600);

fn token_service() -> Arc<TokenService> {
    Arc::new(TokenService::new(
        "integration-access",
        "integration-refresh",
        HOUR,
        Duration::from_secs(24 * 3600),
    ))
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn redis_slots_overwrite_and_revoke() {
    let (_container, url) = common::start_redis().await;
    let store = RedisSessionStore::new(&url).await.unwrap();
    let user_id = Uuid::new_v4();

    store.issue_pair(user_id, "a1", HOUR, "r1", HOUR).await.unwrap();
    assert!(store.validate_access(user_id, "a1").await);
    assert!(store.validate_refresh(user_id, "r1").await);
    assert!(!store.validate_access(user_id, "r1").await);

    store.issue_pair(user_id, "a2", HOUR, "r2", HOUR).await.unwrap();
    assert!(!store.validate_access(user_id, "a1").await);
    assert!(!store.validate_refresh(user_id, "r1").await);
    assert!(store.validate_access(user_id, "a2").await);

    store.revoke_all(user_id).await.unwrap();
    assert!(!store.validate_access(user_id, "a2").await);
    assert!(!store.validate_refresh(user_id, "r2").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn redis_slot_expires_with_its_ttl() {
    let (_container, url) = common::start_redis().await;
    let store = RedisSessionStore::new(&url).await.unwrap();
    let user_id = Uuid::new_v4();

    store
        .issue_pair(user_id, "a1", Duration::from_secs(1), "r1", HOUR)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert!(!store.validate_access(user_id, "a1").await);
    assert!(store.validate_refresh(user_id, "r1").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn unreachable_redis_fails_closed() {
    let (container, url) = common::start_redis().await;
    let store = RedisSessionStore::new(&url).await.unwrap();
    let user_id = Uuid::new_v4();
    store.issue_pair(user_id, "a1", HOUR, "r1", HOUR).await.unwrap();

    container.stop().await.unwrap();

    assert!(!store.validate_access(user_id, "a1").await);
    assert!(store.revoke_all(user_id).await.is_err());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn credential_flows_rotate_and_revoke_sessions() {
    let (_pg, pool) = common::start_postgres().await;
    let (_redis, url) = common::start_redis().await;
    let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(&url).await.unwrap());
    let auth = AuthService::new(pool.clone(), token_service(), sessions.clone());

    let user_id = seed_user(&pool, "ada@example.com", "password123", Role::User).await;

    assert!(matches!(
        auth.login("ada@example.com", "wrong-password").await,
        Err(AuthError::InvalidCredentials)
    ));

    let first = auth.login("ada@example.com", "password123").await.unwrap();
    assert_eq!(first.user.id, user_id);
    assert!(sessions.validate_access(user_id, &first.tokens.access_token).await);

    // Refresh rotates the pair; the consumed refresh token is dead.
    let second = auth.refresh(&first.tokens.refresh_token).await.unwrap();
    assert!(!sessions.validate_access(user_id, &first.tokens.access_token).await);
    assert!(matches!(
        auth.refresh(&first.tokens.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    ));

    auth.change_password(user_id, "password123", "correct-horse")
        .await
        .unwrap();
    assert!(!sessions.validate_access(user_id, &second.tokens.access_token).await);
    assert!(matches!(
        auth.refresh(&second.tokens.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    ));
    assert!(matches!(
        auth.change_password(user_id, "password123", "another-one").await,
        Err(AuthError::InvalidCredentials)
    ));

    let third = auth.login("ada@example.com", "correct-horse").await.unwrap();
    auth.logout(user_id).await.unwrap();
    assert!(!sessions.validate_access(user_id, &third.tokens.access_token).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn email_change_is_unique_and_revokes() {
    let (_pg, pool) = common::start_postgres().await;
    let (_redis, url) = common::start_redis().await;
    let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(&url).await.unwrap());
    let auth = AuthService::new(pool.clone(), token_service(), sessions.clone());

    let user_id = seed_user(&pool, "ada@example.com", "password123", Role::User).await;
    seed_user(&pool, "alan@example.com", "password123", Role::User).await;

    let session = auth.login("ada@example.com", "password123").await.unwrap();

    assert!(matches!(
        auth.change_email(user_id, "alan@example.com").await,
        Err(AuthError::EmailAlreadyExists)
    ));
    assert!(sessions.validate_access(user_id, &session.tokens.access_token).await);

    let updated = auth.change_email(user_id, "lovelace@example.com").await.unwrap();
    assert_eq!(updated.email, "lovelace@example.com");
    assert!(!sessions.validate_access(user_id, &session.tokens.access_token).await);
    assert!(auth.login("lovelace@example.com", "password123").await.is_ok());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn registration_signs_in_and_rejects_duplicate_email() {
    let (_pg, pool) = common::start_postgres().await;
    let (_redis, url) = common::start_redis().await;
    let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(&url).await.unwrap());
    let auth = AuthService::new(pool.clone(), token_service(), sessions.clone());

    let new_user = NewUser {
        email: "grace@example.com",
        password: "password123",
        first_name: "Grace",
        last_name: "Hopper",
    };
    let session = auth.register(new_user.clone()).await.unwrap();
    assert_eq!(session.user.email, "grace@example.com");
    assert_eq!(session.user.role, Role::User);
    assert!(sessions.validate_access(session.user.id, &session.tokens.access_token).await);
    assert!(sessions.validate_refresh(session.user.id, &session.tokens.refresh_token).await);

    assert!(matches!(
        auth.register(new_user).await,
        Err(AuthError::EmailAlreadyExists)
    ));
    // The failed attempt leaves the first session current.
    assert!(sessions.validate_access(session.user.id, &session.tokens.access_token).await);

    let login = auth.login("grace@example.com", "password123").await.unwrap();
    assert_eq!(login.user.id, session.user.id);
}
