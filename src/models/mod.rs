pub mod category;
pub mod order;
pub mod ticket;
pub mod user;

pub use category::{Category, CategoryStatus};
pub use order::{NewOrderRow, Order, OrderStatus};
pub use ticket::{OrderDetail, RedemptionTarget, TicketHolder};
pub use user::{NewUser, Role, User};
