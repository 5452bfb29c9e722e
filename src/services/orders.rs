//! Order lifecycle orchestration.
//!
//! Each public operation is one transaction. Creation reserves stock, writes
//! the order and its tickets, and commits them together; if anything fails the
//! transaction rolls back and the reservation disappears with it. Cancellation
//! locks the order row before releasing stock, so a second cancel sees a
//! terminal status and never releases twice.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::inventory;
use super::lifecycle::{self, OrderCommand, OrderError};
use super::ticket_code::CodeGenerator;
use crate::models::{NewOrderRow, Order, OrderDetail, OrderStatus, Role, TicketHolder};

/// Attempts before a run of code collisions is treated as a failure.
pub const MAX_CODE_ATTEMPTS: u32 = 3;

const UNIQUE_CODE_CONSTRAINTS: [&str; 2] = ["orders_invoice_id_key", "order_details_ticket_code_key"];

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub quantity: i32,
    pub holders: Vec<TicketHolder>,
    pub same_as_orderer: bool,
}

#[derive(Debug, Clone)]
pub struct OrderWithTickets {
    pub order: Order,
    pub tickets: Vec<OrderDetail>,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<OrderWithTickets>,
    pub total: i64,
}

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    codes: Arc<dyn CodeGenerator>,
    lock_timeout: Duration,
}

impl OrderService {
    pub fn new(pool: PgPool, codes: Arc<dyn CodeGenerator>, lock_timeout: Duration) -> Self {
        Self {
            pool,
            codes,
            lock_timeout,
        }
    }

    pub async fn create_order(&self, request: NewOrder) -> Result<OrderWithTickets, OrderError> {
        let holders = lifecycle::ticket_holders(
            request.quantity,
            request.holders.clone(),
            request.same_as_orderer,
        )?;

        let mut attempt = 1;
        loop {
            match self.try_create(&request, &holders).await {
                Err(OrderError::Database(err)) if is_code_collision(&err) => {
                    if attempt >= MAX_CODE_ATTEMPTS {
                        return Err(OrderError::CodesExhausted(attempt));
                    }
                    warn!(attempt, "Ticket code collision, regenerating codes");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_create(
        &self,
        request: &NewOrder,
        holders: &[TicketHolder],
    ) -> Result<OrderWithTickets, OrderError> {
        let mut tx = self.begin().await?;

        let category = inventory::reserve(&mut tx, request.category_id, request.quantity).await?;

        let row = NewOrderRow {
            category_id: request.category_id,
            user_id: request.user_id,
            invoice_id: self.codes.invoice_id(),
            quantity: request.quantity,
            total_price: category.price * Decimal::from(request.quantity),
        };
        let order = Order::insert(&row, &mut *tx).await?;

        let mut tickets = Vec::with_capacity(holders.len());
        for holder in holders {
            let code = self.codes.ticket_code();
            tickets.push(OrderDetail::insert(order.id, &code, holder, &mut *tx).await?);
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            category_id = %order.category_id,
            quantity = order.quantity,
            "Order created"
        );

        Ok(OrderWithTickets { order, tickets })
    }

    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order, OrderError> {
        let mut tx = self.begin().await?;

        let order = Order::lock(order_id, &mut *tx)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        if order.user_id != user_id {
            return Err(OrderError::NotOwner);
        }

        let next = lifecycle::transition(order.status, OrderCommand::Cancel)?;
        inventory::release(&mut tx, order.category_id, order.quantity).await?;
        let order = Order::set_status(order_id, next, &mut *tx).await?;

        tx.commit().await?;

        info!(order_id = %order_id, user_id = %user_id, "Order cancelled");
        Ok(order)
    }

    /// Confirms payment. Payment itself is verified by whoever calls this.
    pub async fn mark_paid(&self, order_id: Uuid) -> Result<Order, OrderError> {
        let mut tx = self.begin().await?;

        let order = Order::lock(order_id, &mut *tx)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        let next = lifecycle::transition(order.status, OrderCommand::MarkPaid)?;
        let order = Order::set_status(order_id, next, &mut *tx).await?;

        tx.commit().await?;

        info!(order_id = %order_id, "Order marked paid");
        Ok(order)
    }

    pub async fn redeem_ticket(&self, ticket_code: &str) -> Result<OrderDetail, OrderError> {
        let mut tx = self.begin().await?;

        let target = OrderDetail::lock_for_redemption(ticket_code, &mut *tx)
            .await?
            .ok_or(OrderError::TicketNotFound)?;
        lifecycle::ensure_redeemable(target.order_status, target.redeemed)?;
        let ticket = OrderDetail::mark_redeemed(target.detail_id, &mut *tx).await?;

        tx.commit().await?;

        info!(
            ticket_id = %ticket.id,
            order_id = %target.order_id,
            "Ticket redeemed"
        );
        Ok(ticket)
    }

    /// Owners see their own orders; admins see any order.
    pub async fn get_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<OrderWithTickets, OrderError> {
        let order = Order::find_by_id(order_id, &self.pool)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        if order.user_id != user_id && role != Role::Admin {
            return Err(OrderError::NotOwner);
        }

        let tickets = OrderDetail::find_by_order_ids(&[order.id], &self.pool).await?;
        Ok(OrderWithTickets { order, tickets })
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, OrderError> {
        let offset = page_offset(page, limit)?;
        let total = Order::count_for_user(user_id, &self.pool).await?;
        let orders = Order::list_for_user(user_id, limit, offset, &self.pool).await?;
        self.attach_tickets(orders, total).await
    }

    /// All orders across customers, for administrators.
    pub async fn list_all_orders(&self, page: i64, limit: i64) -> Result<OrderPage, OrderError> {
        let offset = page_offset(page, limit)?;
        let total = Order::count_all(&self.pool).await?;
        let orders = Order::list_all(limit, offset, &self.pool).await?;
        self.attach_tickets(orders, total).await
    }

    async fn attach_tickets(&self, orders: Vec<Order>, total: i64) -> Result<OrderPage, OrderError> {
        let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
        let mut by_order: HashMap<Uuid, Vec<OrderDetail>> = HashMap::new();
        for ticket in OrderDetail::find_by_order_ids(&ids, &self.pool).await? {
            by_order.entry(ticket.order_id).or_default().push(ticket);
        }

        let orders = orders
            .into_iter()
            .map(|order| {
                let tickets = by_order.remove(&order.id).unwrap_or_default();
                OrderWithTickets { order, tickets }
            })
            .collect();

        Ok(OrderPage { orders, total })
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, OrderError> {
        let mut tx = self.pool.begin().await?;
        set_lock_timeout(&mut tx, self.lock_timeout).await?;
        Ok(tx)
    }
}

/// Bounds how long this transaction waits on row locks; expiry aborts it and
/// the rollback leaves stock untouched.
async fn set_lock_timeout(conn: &mut PgConnection, timeout: Duration) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", timeout.as_millis()))
        .execute(conn)
        .await?;
    Ok(())
}

/// Row offset of a 1-based page; pages too far out to address are rejected.
fn page_offset(page: i64, limit: i64) -> Result<i64, OrderError> {
    (page.max(1) - 1)
        .checked_mul(limit.max(0))
        .ok_or(OrderError::PageOutOfRange(page))
}

fn is_code_collision(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation()
                && db
                    .constraint()
                    .is_some_and(|name| UNIQUE_CODE_CONSTRAINTS.contains(&name))
        }
        _ => false,
    }
}

/// Tickets are only shown once the order has been paid.
pub fn visible_tickets(status: OrderStatus, tickets: Vec<OrderDetail>) -> Option<Vec<OrderDetail>> {
    match status {
        OrderStatus::Paid => Some(tickets),
        OrderStatus::Pending | OrderStatus::Cancelled => None,
    }
}
