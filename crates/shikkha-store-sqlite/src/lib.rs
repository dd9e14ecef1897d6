//! SQLite backend for the Shikkha warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. One file holds every layer: raw
//! landing tables, staging views, dimensions, monthly-partitioned facts,
//! marts, and the run log.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteWarehouse;
