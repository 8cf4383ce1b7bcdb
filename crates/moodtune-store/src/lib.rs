//! MoodTune Store - Credential and playlist store backends
//!
//! - [`MemoryStore`]: process-local store for tests and development
//! - [`PostgresStore`]: durable store on PostgreSQL via sqlx
//! - [`TimeoutStore`]: decorator bounding every call of an inner store

pub mod memory;
pub mod postgres;
pub mod timeout;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use timeout::TimeoutStore;
