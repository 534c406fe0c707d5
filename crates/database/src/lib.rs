//! # Stock Dashboard Database Crate
//!
//! The PostgreSQL row source for the record store.
//!
//! ## Public API
//!
//! - `connect`: establishes the connection pool from `DATABASE_URL`.
//! - `run_migrations`: creates the `stock_data` table when missing. Only run
//!   when the configured table is that one (`is_managed_table`).
//! - `StockRepository`: fetches every daily row and reports the data version
//!   used to key the store cache.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, is_managed_table, run_migrations, MANAGED_TABLE};
pub use error::DbError;
pub use repository::{DbStockRow, StockRepository};
