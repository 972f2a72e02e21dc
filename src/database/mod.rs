//! Database Module
//!
//! Store traits plus the PostgreSQL and in-memory implementations.

pub mod connection;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::{run_migrations, DatabaseConfig, Pagination};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{IdentityStore, ProfileStore, StoreError, StoreResult, Upserted};
