//! Inventory ledger: the only writer of a category's `quantity` and `status`.
//!
//! Both operations run on a connection that is already inside a transaction.
//! `reserve` takes a `FOR UPDATE` lock on the category row, so concurrent
//! reservations against one category queue behind each other while other
//! categories proceed untouched. The lock is released on commit or rollback.

use sqlx::PgConnection;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Category, CategoryStatus};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Stock not available")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("Ticket category not found")]
    CategoryNotFound,

    #[error("Reservation quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

/// Remaining stock of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stock {
    pub quantity: i32,
    pub status: CategoryStatus,
}

impl Stock {
    pub fn of(category: &Category) -> Self {
        Self {
            quantity: category.quantity,
            status: category.status,
        }
    }

    /// All or nothing: either the whole request fits or nothing changes.
    pub fn reserve(self, requested: i32) -> Result<Self, InventoryError> {
        if requested <= 0 {
            return Err(InventoryError::InvalidQuantity(requested));
        }
        if requested > self.quantity {
            return Err(InventoryError::InsufficientStock {
                requested,
                available: self.quantity,
            });
        }

        let quantity = self.quantity - requested;
        let status = if quantity == 0 {
            CategoryStatus::Sold
        } else {
            self.status
        };
        Ok(Self { quantity, status })
    }

    pub fn release(self, returned: i32) -> Result<Self, InventoryError> {
        if returned <= 0 {
            return Err(InventoryError::InvalidQuantity(returned));
        }

        let quantity = self.quantity + returned;
        let status = if self.status == CategoryStatus::Sold && quantity > 0 {
            CategoryStatus::Available
        } else {
            self.status
        };
        Ok(Self { quantity, status })
    }
}

/// Locks the category row and takes `quantity` units out of its stock.
/// Returns the category as it stands after the decrement.
pub async fn reserve(
    conn: &mut PgConnection,
    category_id: Uuid,
    quantity: i32,
) -> Result<Category, InventoryError> {
    let category = Category::lock(category_id, &mut *conn)
        .await?
        .ok_or(InventoryError::CategoryNotFound)?;

    let next = match Stock::of(&category).reserve(quantity) {
        Ok(next) => next,
        Err(err) => {
            debug!(
                category_id = %category_id,
                requested = quantity,
                available = category.quantity,
                "Reservation rejected"
            );
            return Err(err);
        }
    };

    let updated = Category::write_stock(category_id, next.quantity, next.status, &mut *conn).await?;

    info!(
        category_id = %category_id,
        reserved = quantity,
        remaining = updated.quantity,
        status = ?updated.status,
        "Stock reserved"
    );

    Ok(updated)
}

/// Puts `quantity` units back. Only called for the exact quantity of an order
/// being cancelled in the same transaction.
pub async fn release(
    conn: &mut PgConnection,
    category_id: Uuid,
    quantity: i32,
) -> Result<Category, InventoryError> {
    let category = Category::lock(category_id, &mut *conn)
        .await?
        .ok_or(InventoryError::CategoryNotFound)?;

    let next = Stock::of(&category).release(quantity)?;
    let updated = Category::write_stock(category_id, next.quantity, next.status, &mut *conn).await?;

    info!(
        category_id = %category_id,
        released = quantity,
        remaining = updated.quantity,
        status = ?updated.status,
        "Stock released"
    );

    Ok(updated)
}
