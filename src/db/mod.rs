//! Database module
//!
//! PostgreSQL integration using sqlx with:
//! - Connection pool management
//! - Row types with FromRow
//! - Repository functions for data access
//! - COPY-based atomic replacement of a playlist's channels
//!
//! plus the store traits the services depend on and an in-memory catalog.

pub mod memory;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

// Re-export commonly used items
pub use memory::MemoryCatalog;
pub use pool::{connect_catalog, ping, redact_url, run_migrations};
pub use store::{ChannelStore, MediaStore, PlaylistStore, ReplaceSummary, Stores};
