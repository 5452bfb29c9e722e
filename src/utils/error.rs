use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

use crate::services::lifecycle::MIN_ORDER_QUANTITY;
use crate::services::{AuthError, InventoryError, OrderError, SessionError};
use crate::utils::response::error as error_response;
use crate::utils::validation::FieldErrors;

const INTERNAL_MESSAGE: &str = "Internal server error, Please try again later";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please check your input and try again")]
    Validation(FieldErrors),

    #[error("Bad request, Please check your request")]
    BadRequest,

    // Domain conflicts
    #[error("Stock not available")]
    InsufficientStock,

    #[error("The number of order details requested does not match the quantity")]
    QuantityMismatch,

    #[error("Order already paid")]
    AlreadyPaid,

    #[error("Order already cancelled")]
    AlreadyCancelled,

    #[error("Order not paid")]
    OrderNotPaid,

    #[error("Ticket already redeemed")]
    TicketAlreadyRedeemed,

    #[error("Email already exists")]
    EmailAlreadyExists,

    // Not found
    #[error("Ticket category not found")]
    CategoryNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Ticket not found")]
    TicketNotFound,

    #[error("User not found")]
    UserNotFound,

    // Authorization
    #[error("You are not allowed to access this order")]
    Unauthorized,

    #[error("You don't have permission to access this resource")]
    InsufficientPermissions,

    #[error("Please login to access this resource")]
    LoginRequired,

    #[error("Please provide a valid access token")]
    InvalidAccessToken,

    #[error("Please provide a valid refresh token")]
    InvalidRefreshToken,

    #[error("Your session has expired, please login again")]
    SessionExpired,

    #[error("Email or password is incorrect, Please try again")]
    InvalidCredentials,

    // Internal
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest
            | AppError::InsufficientStock
            | AppError::QuantityMismatch
            | AppError::AlreadyPaid
            | AppError::AlreadyCancelled
            | AppError::OrderNotPaid
            | AppError::TicketAlreadyRedeemed => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::CategoryNotFound
            | AppError::OrderNotFound
            | AppError::TicketNotFound
            | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::LoginRequired
            | AppError::InvalidAccessToken
            | AppError::InvalidRefreshToken
            | AppError::SessionExpired
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest => "BAD_REQUEST",
            AppError::InsufficientStock => "INSUFFICIENT_STOCK",
            AppError::QuantityMismatch => "QUANTITY_MISMATCH",
            AppError::AlreadyPaid => "ORDER_ALREADY_PAID",
            AppError::AlreadyCancelled => "ORDER_ALREADY_CANCELLED",
            AppError::OrderNotPaid => "ORDER_NOT_PAID",
            AppError::TicketAlreadyRedeemed => "TICKET_ALREADY_REDEEMED",
            AppError::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            AppError::CategoryNotFound => "CATEGORY_NOT_FOUND",
            AppError::OrderNotFound => "ORDER_NOT_FOUND",
            AppError::TicketNotFound => "TICKET_NOT_FOUND",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::LoginRequired => "LOGIN_REQUIRED",
            AppError::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            AppError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(_) | AppError::InternalServerError(_)
        )
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::InternalServerError(detail) => {
                error!(detail = %detail, "Internal error");
            }
            other => {
                debug!(code = other.code(), "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let (public_message, details) = match &self {
            AppError::Validation(fields) => {
                let message = if fields.len() > 1 {
                    "Some required information is missing or incorrect"
                } else {
                    "Please check your input and try again"
                };
                (message.to_string(), serde_json::to_value(fields).ok())
            }
            internal if internal.is_internal() => (INTERNAL_MESSAGE.to_string(), None),
            other => (other.to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock { .. } => AppError::InsufficientStock,
            InventoryError::CategoryNotFound => AppError::CategoryNotFound,
            InventoryError::InvalidQuantity(_) => {
                let mut fields = FieldErrors::new();
                fields.add("quantity", "quantity must be at least 1");
                AppError::Validation(fields)
            }
            InventoryError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidQuantity(quantity) => {
                let mut fields = FieldErrors::new();
                if quantity < MIN_ORDER_QUANTITY {
                    fields.add("quantity", "quantity must be at least 1");
                } else {
                    fields.add("quantity", "quantity cannot be more than 10");
                }
                AppError::Validation(fields)
            }
            OrderError::PageOutOfRange(_) => {
                let mut fields = FieldErrors::new();
                fields.add("page", "page is out of range");
                AppError::Validation(fields)
            }
            OrderError::QuantityMismatch { .. } => AppError::QuantityMismatch,
            OrderError::AlreadyPaid => AppError::AlreadyPaid,
            OrderError::AlreadyCancelled => AppError::AlreadyCancelled,
            OrderError::OrderNotPaid => AppError::OrderNotPaid,
            OrderError::TicketAlreadyRedeemed => AppError::TicketAlreadyRedeemed,
            OrderError::OrderNotFound => AppError::OrderNotFound,
            OrderError::TicketNotFound => AppError::TicketNotFound,
            OrderError::NotOwner => AppError::Unauthorized,
            OrderError::Inventory(e) => e.into(),
            OrderError::CodesExhausted(attempts) => AppError::InternalServerError(format!(
                "ticket code generation collided {attempts} times"
            )),
            OrderError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::InternalServerError(format!("session store: {err:?}"))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::InvalidRefreshToken => AppError::InvalidRefreshToken,
            AuthError::UserNotFound => AppError::UserNotFound,
            AuthError::EmailAlreadyExists => AppError::EmailAlreadyExists,
            AuthError::Token(e) => AppError::InternalServerError(format!("token signing: {e:?}")),
            AuthError::Session(e) => e.into(),
            AuthError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn domain_errors_keep_their_classification() {
        let cases = [
            (AppError::from(OrderError::AlreadyPaid), StatusCode::BAD_REQUEST),
            (AppError::from(OrderError::NotOwner), StatusCode::FORBIDDEN),
            (AppError::from(OrderError::TicketNotFound), StatusCode::NOT_FOUND),
            (
                AppError::from(OrderError::Inventory(InventoryError::InsufficientStock {
                    requested: 3,
                    available: 2,
                })),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(InventoryError::CategoryNotFound),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error:?}");
        }
    }

    #[tokio::test]
    async fn storage_details_never_reach_the_client() {
        let (status, body) = body_json(AppError::from(OrderError::Database(
            sqlx::Error::Protocol("relation \"orders\" is locked".to_string()),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
        assert!(!body.to_string().contains("orders"));
    }

    #[tokio::test]
    async fn validation_errors_carry_field_details() {
        let mut fields = FieldErrors::new();
        fields.add("quantity", "quantity cannot be more than 10");
        fields.add("category_id", "please enter your category id");

        let (status, body) = body_json(AppError::Validation(fields)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(
            body["error"]["details"]["quantity"],
            "quantity cannot be more than 10"
        );
    }

    #[tokio::test]
    async fn out_of_range_order_inputs_are_validation_errors() {
        let (status, body) = body_json(AppError::from(OrderError::InvalidQuantity(11))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["quantity"], "quantity cannot be more than 10");

        let (_, body) = body_json(AppError::from(OrderError::InvalidQuantity(0))).await;
        assert_eq!(body["error"]["details"]["quantity"], "quantity must be at least 1");

        let (status, body) = body_json(AppError::from(OrderError::PageOutOfRange(i64::MAX))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["page"], "page is out of range");
    }

    #[tokio::test]
    async fn conflict_messages_are_fixed() {
        let (_, body) = body_json(AppError::TicketAlreadyRedeemed).await;
        assert_eq!(body["error"]["message"], "Ticket already redeemed");
        assert_eq!(body["error"]["code"], "TICKET_ALREADY_REDEEMED");
    }
}
