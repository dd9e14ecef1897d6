//! Core types and trait definitions for the Shikkha education warehouse.
//!
//! This crate is deliberately free of database and CLI dependencies.
//! All other crates depend on it; it depends on nothing heavier than
//! chrono, serde, and sha2.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod grading;
pub mod keys;
pub mod mart;
pub mod normalize;
pub mod report;
pub mod source;
pub mod store;

pub use error::{Error, Result};
