pub mod error;
pub mod response;
pub mod validation;

pub use error::AppError;
pub use validation::{FieldErrors, Validate};
