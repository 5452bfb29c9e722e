use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use std::fmt;
use uuid::Uuid;

/// Closed set of roles. Anything else is rejected when decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account row. The password hash never leaves the database; credential
/// checks run through `pgcrypto`'s `crypt()`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields for a self-service sign-up.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl User {
    /// Inserts a customer account, hashing the password in the database.
    pub async fn create<'e>(
        new_user: &NewUser<'_>,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role)
            VALUES ($1, crypt($2, gen_salt('bf')), $3, $4, 'user')
            RETURNING id, email, first_name, last_name, role, created_at, updated_at
            "#,
        )
        .bind(new_user.email)
        .bind(new_user.password)
        .bind(new_user.first_name)
        .bind(new_user.last_name)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e>(
        id: Uuid,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Returns the user only when the password matches the stored hash.
    pub async fn find_by_credentials<'e>(
        email: &str,
        password: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, role, created_at, updated_at
            FROM users
            WHERE email = $1 AND password_hash = crypt($2, password_hash)
            "#,
        )
        .bind(email)
        .bind(password)
        .fetch_optional(executor)
        .await
    }

    /// Replaces the password hash if `old_password` is still current.
    /// `None` means the old password did not match.
    pub async fn update_password<'e>(
        id: Uuid,
        old_password: &str,
        new_password: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = crypt($3, gen_salt('bf')), updated_at = NOW()
            WHERE id = $1 AND password_hash = crypt($2, password_hash)
            RETURNING id, email, first_name, last_name, role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(old_password)
        .bind(new_password)
        .fetch_optional(executor)
        .await
    }

    pub async fn update_email<'e>(
        id: Uuid,
        email: &str,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, first_name, last_name, role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_as_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }
}
