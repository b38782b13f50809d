//! Request models with validation at construction
//!
//! All user input is validated before it reaches a repository.
//! Invalid input returns ValidationError, not panic.

pub mod fields;
pub mod pagination;
pub mod status;
pub mod validation;

pub use fields::{Code, Email};
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use validation::ValidationError;
