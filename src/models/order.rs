use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Order status. `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub category_id: Uuid,
    pub user_id: Uuid,
    pub invoice_id: String,
    pub status: OrderStatus,
    pub quantity: i32,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values for a freshly reserved order.
#[derive(Debug, Clone)]
pub struct NewOrderRow {
    pub category_id: Uuid,
    pub user_id: Uuid,
    pub invoice_id: String,
    pub quantity: i32,
    pub total_price: Decimal,
}

impl Order {
    pub async fn insert<'e>(
        row: &NewOrderRow,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (category_id, user_id, invoice_id, status, quantity, total_price)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING id, category_id, user_id, invoice_id, status, quantity, total_price,
                      created_at, updated_at
            "#,
        )
        .bind(row.category_id)
        .bind(row.user_id)
        .bind(&row.invoice_id)
        .bind(row.quantity)
        .bind(row.total_price)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e>(
        id: Uuid,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, category_id, user_id, invoice_id, status, quantity, total_price,
                   created_at, updated_at
            FROM orders
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub(crate) async fn lock<'e>(
        id: Uuid,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, category_id, user_id, invoice_id, status, quantity, total_price,
                   created_at, updated_at
            FROM orders
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub(crate) async fn set_status<'e>(
        id: Uuid,
        status: OrderStatus,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, category_id, user_id, invoice_id, status, quantity, total_price,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    /// Newest first.
    pub async fn list_for_user<'e>(
        user_id: Uuid,
        limit: i64,
        offset: i64,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, category_id, user_id, invoice_id, status, quantity, total_price,
                   created_at, updated_at
            FROM orders
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count_for_user<'e>(
        user_id: Uuid,
        executor: impl PgExecutor<'e>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Every customer's orders, newest first.
    pub async fn list_all<'e>(
        limit: i64,
        offset: i64,
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, category_id, user_id, invoice_id, status, quantity, total_price,
                   created_at, updated_at
            FROM orders
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count_all<'e>(executor: impl PgExecutor<'e>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE deleted_at IS NULL")
            .fetch_one(executor)
            .await
    }
}
