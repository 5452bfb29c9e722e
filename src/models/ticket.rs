use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use super::order::OrderStatus;

/// Name and identity printed on a single ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketHolder {
    pub full_name: String,
    pub identity_number: String,
}

impl TicketHolder {
    /// Strips surrounding whitespace so stored values match what was validated.
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            identity_number: self.identity_number.trim().to_string(),
        }
    }
}

/// One redeemable ticket belonging to an order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_code: String,
    pub full_name: String,
    pub identity_number: String,
    pub redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A ticket row locked for redemption together with its order's status.
#[derive(Debug, Clone, FromRow)]
pub struct RedemptionTarget {
    pub detail_id: Uuid,
    pub order_id: Uuid,
    pub redeemed: bool,
    pub order_status: OrderStatus,
}

impl OrderDetail {
    pub async fn insert<'e>(
        order_id: Uuid,
        ticket_code: &str,
        holder: &TicketHolder,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, OrderDetail>(
            r#"
            INSERT INTO order_details (order_id, ticket_code, full_name, identity_number)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, ticket_code, full_name, identity_number, redeemed,
                      redeemed_at, created_at
            "#,
        )
        .bind(order_id)
        .bind(ticket_code)
        .bind(&holder.full_name)
        .bind(&holder.identity_number)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_order_ids<'e>(
        order_ids: &[Uuid],
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, OrderDetail>(
            r#"
            SELECT id, order_id, ticket_code, full_name, identity_number, redeemed,
                   redeemed_at, created_at
            FROM order_details
            WHERE order_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(order_ids)
        .fetch_all(executor)
        .await
    }

    pub(crate) async fn lock_for_redemption<'e>(
        ticket_code: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<RedemptionTarget>, sqlx::Error> {
        sqlx::query_as::<_, RedemptionTarget>(
            r#"
            SELECT d.id AS detail_id, d.order_id, d.redeemed, o.status AS order_status
            FROM order_details d
            JOIN orders o ON o.id = d.order_id
            WHERE d.ticket_code = $1 AND o.deleted_at IS NULL
            FOR UPDATE OF d
            "#,
        )
        .bind(ticket_code)
        .fetch_optional(executor)
        .await
    }

    pub(crate) async fn mark_redeemed<'e>(
        id: Uuid,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, OrderDetail>(
            r#"
            UPDATE order_details
            SET redeemed = TRUE, redeemed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND redeemed = FALSE
            RETURNING id, order_id, ticket_code, full_name, identity_number, redeemed,
                      redeemed_at, created_at
            "#,
        )
        .bind(id)
        .fetch_one(executor)
        .await
    }
}
