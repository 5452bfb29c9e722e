pub mod auth;
pub mod inventory;
pub mod lifecycle;
pub mod orders;
pub mod session_store;
pub mod ticket_code;
pub mod tokens;

pub use auth::{AuthError, AuthService, IssuedSession};
pub use inventory::{InventoryError, Stock};
pub use lifecycle::{OrderCommand, OrderError};
pub use orders::{NewOrder, OrderPage, OrderService, OrderWithTickets};
pub use session_store::{
    InMemorySessionStore, RedisSessionStore, SessionError, SessionStore, TokenKind,
};
pub use ticket_code::{CodeGenerator, RandomCodeGenerator};
pub use tokens::{AccessClaims, RefreshClaims, TokenError, TokenPair, TokenService};
