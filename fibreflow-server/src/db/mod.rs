//! Database layer - connection pool, schema and repositories
//!
//! # Design Principles
//!
//! - One shared connection pool, no Arc<Mutex<Connection>>
//! - All list operations use JOINs or window counts - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_lazy_pool, create_pool, create_pool_with_options};
pub use repos::*;
