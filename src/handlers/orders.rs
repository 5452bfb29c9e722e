use axum::{extract::State, response::Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::middleware::{AuthUser, RequireAdmin};
use crate::models::{Order, OrderDetail, OrderStatus, Role, TicketHolder};
use crate::services::lifecycle::{MAX_ORDER_QUANTITY, MIN_ORDER_QUANTITY};
use crate::services::orders::visible_tickets;
use crate::services::{NewOrder, OrderWithTickets};
use crate::state::AppState;
use crate::utils::response::{created, paginated, success, Pagination};
use crate::utils::{AppError, FieldErrors, Validate};

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub same_as_orderer: bool,
    #[serde(default)]
    pub order_details: Vec<TicketHolder>,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.category_id.is_none() {
            errors.add("category_id", "please enter your category id");
        }
        errors.check_range(
            "quantity",
            i64::from(self.quantity),
            i64::from(MIN_ORDER_QUANTITY),
            i64::from(MAX_ORDER_QUANTITY),
        );
        errors.check_range(
            "order_details",
            self.order_details.len() as i64,
            1,
            i64::from(MAX_ORDER_QUANTITY),
        );
        for (index, holder) in self.order_details.iter().enumerate() {
            errors.check_text(
                &format!("order_details.{index}.full_name"),
                &holder.full_name,
                3,
                255,
            );
            errors.check_text(
                &format!("order_details.{index}.identity_number"),
                &holder.identity_number,
                5,
                20,
            );
        }

        errors.into_result()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListOrdersQuery {
    /// Page is 1-based and bounded; limit defaults to 10 and is capped at 100.
    fn resolve(&self) -> Result<(i64, i64), FieldErrors> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        let mut errors = FieldErrors::new();
        errors.check_range("page", page, 1, MAX_PAGE);
        errors.check_range("limit", limit, 1, i64::MAX);
        errors.into_result()?;

        Ok((page, limit.min(MAX_PAGE_LIMIT)))
    }
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub ticket_code: String,
    pub full_name: String,
    pub identity_number: String,
    pub redeemed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl From<OrderDetail> for TicketResponse {
    fn from(detail: OrderDetail) -> Self {
        Self {
            id: detail.id,
            ticket_code: detail.ticket_code,
            full_name: detail.full_name,
            identity_number: detail.identity_number,
            redeemed: detail.redeemed,
            redeemed_at: detail.redeemed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub invoice_id: String,
    pub category_id: Uuid,
    pub status: OrderStatus,
    pub quantity: i32,
    pub total_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Vec<TicketResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    /// Ticket codes are withheld until the order is paid.
    pub fn new(order: Order, tickets: Vec<OrderDetail>) -> Self {
        let tickets = visible_tickets(order.status, tickets)
            .map(|tickets| tickets.into_iter().map(TicketResponse::from).collect());

        Self {
            id: order.id,
            invoice_id: order.invoice_id,
            category_id: order.category_id,
            status: order.status,
            quantity: order.quantity,
            total_price: order.total_price,
            tickets,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<OrderWithTickets> for OrderResponse {
    fn from(value: OrderWithTickets) -> Self {
        Self::new(value.order, value.tickets)
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateOrderRequest>,
) -> Result<Response, AppError> {
    let category_id = request.category_id.ok_or(AppError::BadRequest)?;

    let order = state
        .orders
        .create_order(NewOrder {
            user_id: user.user_id,
            category_id,
            quantity: request.quantity,
            holders: request.order_details,
            same_as_orderer: request.same_as_orderer,
        })
        .await?;

    Ok(created(
        OrderResponse::from(order),
        "Order created successfully",
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListOrdersQuery>,
) -> Result<Response, AppError> {
    let (page, limit) = query.resolve()?;
    let result = state.orders.list_orders(user.user_id, page, limit).await?;

    let orders: Vec<OrderResponse> = result.orders.into_iter().map(OrderResponse::from).collect();

    Ok(paginated(
        orders,
        Pagination::new(page, limit, result.total),
        "Orders retrieved successfully",
    ))
}

pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ApiQuery(query): ApiQuery<ListOrdersQuery>,
) -> Result<Response, AppError> {
    let (page, limit) = query.resolve()?;
    let result = state.orders.list_all_orders(page, limit).await?;

    let orders: Vec<OrderResponse> = result.orders.into_iter().map(OrderResponse::from).collect();

    Ok(paginated(
        orders,
        Pagination::new(page, limit, result.total),
        "Orders retrieved successfully",
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let order = state
        .orders
        .get_order(order_id, user.user_id, user.role)
        .await?;

    Ok(success(
        OrderResponse::from(order),
        "Order retrieved successfully",
    ))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.cancel_order(order_id, user.user_id).await?;

    Ok(success(
        OrderResponse::new(order, Vec::new()),
        "Order cancelled successfully",
    ))
}

pub async fn verify_order(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    state.orders.mark_paid(order_id).await?;
    let order = state
        .orders
        .get_order(order_id, admin.user_id, Role::Admin)
        .await?;

    Ok(success(
        OrderResponse::from(order),
        "Order verified successfully",
    ))
}

pub async fn redeem_ticket(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ApiPath(ticket_code): ApiPath<String>,
) -> Result<Response, AppError> {
    let ticket = state.orders.redeem_ticket(ticket_code.trim()).await?;

    Ok(success(
        TicketResponse::from(ticket),
        "Ticket redeemed successfully",
    ))
}
