//! The transform layer: staged source rows in, dimensional warehouse out.
//!
//! Three stages, in their only permitted order:
//!
//! 1. [`dims`] — slowly-changing dimension version chains plus the geography
//!    and calendar lookups.
//! 2. [`facts`] — monthly-partitioned fact tables whose dimension references
//!    are resolved as of each row's business date.
//! 3. [`marts`] — fully-recomputed analytical aggregates.
//!
//! [`runner::Pipeline`] sequences the stages over any
//! [`shikkha_core::store::Warehouse`], enforces the ordering through the run
//! log, and records one run-log entry per stage execution.

pub mod dims;
pub mod error;
pub mod facts;
pub mod marts;
pub mod pit;
pub mod runner;

pub use error::{Error, Result};
pub use runner::Pipeline;

#[cfg(test)]
mod tests;
