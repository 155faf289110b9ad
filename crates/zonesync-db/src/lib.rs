//! zonesync database access.
//!
//! PostgreSQL persistence for the zone mirror: connection pool wrapper,
//! embedded migrations, and one model per table with async query methods.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::{DbError, DbResult};
pub use migrations::run_migrations;
pub use pool::DbPool;
