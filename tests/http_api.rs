//! End-to-end flow through the HTTP router with a real Postgres and an
//! in-process session store.
//!
//! Docker must be running: `cargo test -- --ignored`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{seed_category, seed_user, LOCK_TIMEOUT};
use ticket_server::models::Role;
use ticket_server::routes::api_routes;
use ticket_server::services::{InMemorySessionStore, RandomCodeGenerator, TokenService};
use ticket_server::state::AppState;

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["token_type"], "Bearer");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn purchase_verify_and_redeem() {
    let (_container, pool) = common::start_postgres().await;
    seed_user(&pool, "buyer@example.com", "password123", Role::User).await;
    seed_user(&pool, "admin@example.com", "password123", Role::Admin).await;
    let category_id = seed_category(&pool, 3, Decimal::new(7500, 2)).await;

    let state = AppState::new(
        pool.clone(),
        TokenService::new("access", "refresh", Duration::from_secs(3600), Duration::from_secs(7200)),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(RandomCodeGenerator),
        LOCK_TIMEOUT,
    );
    let app = api_routes(state);

    let buyer = login(&app, "buyer@example.com").await;
    let admin = login(&app, "admin@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/tickets",
        Some(&buyer),
        Some(json!({
            "category_id": category_id,
            "quantity": 2,
            "same_as_orderer": true,
            "order_details": [{ "full_name": "Ada Lovelace", "identity_number": "31740001" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"].get("tickets").is_none());
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // Buyers cannot confirm payment themselves.
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/tickets/{order_id}/verify"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/tickets/{order_id}/verify"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/tickets/{order_id}"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "paid");
    let tickets = body["data"]["tickets"].as_array().unwrap();
    assert_eq!(tickets.len(), 2);
    let code = tickets[0]["ticket_code"].as_str().unwrap().to_string();

    let redeem = format!("/api/v1/tickets/redeem/{code}");
    let (status, _) = send(&app, Method::PATCH, &redeem, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::PATCH, &redeem, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Ticket already redeemed");

    let (status, body) = send(&app, Method::GET, "/api/v1/tickets?limit=500", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["limit"], 100);
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn oversized_order_is_a_validation_error_and_logout_revokes() {
    let (_container, pool) = common::start_postgres().await;
    seed_user(&pool, "buyer@example.com", "password123", Role::User).await;
    let category_id = seed_category(&pool, 3, Decimal::new(7500, 2)).await;

    let state = AppState::new(
        pool.clone(),
        TokenService::new("access", "refresh", Duration::from_secs(3600), Duration::from_secs(7200)),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(RandomCodeGenerator),
        LOCK_TIMEOUT,
    );
    let app = api_routes(state);
    let buyer = login(&app, "buyer@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/tickets",
        Some(&buyer),
        Some(json!({
            "category_id": category_id,
            "quantity": 11,
            "same_as_orderer": true,
            "order_details": [{ "full_name": "Ada Lovelace", "identity_number": "31740001" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["quantity"], "quantity cannot be more than 10");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/tickets",
        Some(&buyer),
        Some(json!({
            "category_id": category_id,
            "quantity": 3,
            "same_as_orderer": false,
            "order_details": [{ "full_name": "Ada Lovelace", "identity_number": "31740001" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "The number of order details requested does not match the quantity"
    );

    let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/v1/tickets", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "SESSION_EXPIRED");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn register_then_duplicate_is_a_conflict_and_admin_listing_is_gated() {
    let (_container, pool) = common::start_postgres().await;
    seed_user(&pool, "admin@example.com", "password123", Role::Admin).await;
    let category_id = seed_category(&pool, 5, Decimal::new(7500, 2)).await;

    let state = AppState::new(
        pool.clone(),
        TokenService::new("access", "refresh", Duration::from_secs(3600), Duration::from_secs(7200)),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(RandomCodeGenerator),
        LOCK_TIMEOUT,
    );
    let app = api_routes(state);

    let registration = json!({
        "email": "grace@example.com",
        "password": "password123",
        "first_name": "Grace",
        "last_name": "Hopper"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/auth/register", None, Some(registration.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["user"]["role"], "user");
    let buyer = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::POST, "/api/v1/auth/register", None, Some(registration)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Email already exists");

    // The registration token works straight away.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/tickets",
        Some(&buyer),
        Some(json!({
            "category_id": category_id,
            "quantity": 1,
            "same_as_orderer": true,
            "order_details": [{ "full_name": "Grace Hopper", "identity_number": "31740009" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, _) = send(&app, Method::GET, "/api/v1/tickets/admin", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = login(&app, "admin@example.com").await;
    let (status, body) = send(&app, Method::GET, "/api/v1/tickets/admin", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["meta"]["total"], 1);
}
