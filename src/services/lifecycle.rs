//! Order state machine.
//!
//! ```text
//!            MarkPaid
//!   Pending ----------> Paid        (terminal)
//!      |
//!      |  Cancel
//!      +--------------> Cancelled   (terminal, stock released)
//! ```
//!
//! Tickets can be redeemed only while their order is `Paid`, and each ticket
//! only once. Every command is checked here before any row is written.

use thiserror::Error;

use super::inventory::InventoryError;
use crate::models::{OrderStatus, TicketHolder};

pub const MIN_ORDER_QUANTITY: i32 = 1;
pub const MAX_ORDER_QUANTITY: i32 = 10;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Quantity must be between 1 and 10, got {0}")]
    InvalidQuantity(i32),

    #[error("Page {0} is out of range")]
    PageOutOfRange(i64),

    #[error("The number of order details requested does not match the quantity")]
    QuantityMismatch { quantity: i32, supplied: usize },

    #[error("Order already paid")]
    AlreadyPaid,

    #[error("Order already cancelled")]
    AlreadyCancelled,

    #[error("Order not paid")]
    OrderNotPaid,

    #[error("Ticket already redeemed")]
    TicketAlreadyRedeemed,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Ticket not found")]
    TicketNotFound,

    #[error("You are not allowed to access this order")]
    NotOwner,

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Could not allocate unique ticket codes after {0} attempts")]
    CodesExhausted(u32),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCommand {
    MarkPaid,
    Cancel,
}

/// Returns the status reached by applying `command` to an order in `from`.
pub fn transition(from: OrderStatus, command: OrderCommand) -> Result<OrderStatus, OrderError> {
    match (from, command) {
        (OrderStatus::Pending, OrderCommand::MarkPaid) => Ok(OrderStatus::Paid),
        (OrderStatus::Pending, OrderCommand::Cancel) => Ok(OrderStatus::Cancelled),
        (OrderStatus::Paid, _) => Err(OrderError::AlreadyPaid),
        (OrderStatus::Cancelled, _) => Err(OrderError::AlreadyCancelled),
    }
}

pub fn ensure_redeemable(order_status: OrderStatus, redeemed: bool) -> Result<(), OrderError> {
    match order_status {
        OrderStatus::Pending => Err(OrderError::OrderNotPaid),
        OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
        OrderStatus::Paid if redeemed => Err(OrderError::TicketAlreadyRedeemed),
        OrderStatus::Paid => Ok(()),
    }
}

/// Expands the supplied holders into exactly one trimmed holder per ticket.
///
/// With `same_as_orderer` the first supplied holder is printed on every
/// ticket; otherwise one holder per ticket must be supplied.
pub fn ticket_holders(
    quantity: i32,
    supplied: Vec<TicketHolder>,
    same_as_orderer: bool,
) -> Result<Vec<TicketHolder>, OrderError> {
    if !(MIN_ORDER_QUANTITY..=MAX_ORDER_QUANTITY).contains(&quantity) {
        return Err(OrderError::InvalidQuantity(quantity));
    }
    let expected = usize::try_from(quantity).unwrap_or(0);

    if same_as_orderer {
        return match supplied.into_iter().next() {
            Some(holder) => Ok(vec![holder.normalized(); expected]),
            None => Err(OrderError::QuantityMismatch {
                quantity,
                supplied: 0,
            }),
        };
    }

    if supplied.len() != expected {
        return Err(OrderError::QuantityMismatch {
            quantity,
            supplied: supplied.len(),
        });
    }
    Ok(supplied.into_iter().map(TicketHolder::normalized).collect())
}
