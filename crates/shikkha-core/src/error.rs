//! Error types for `shikkha-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid month literal: {0:?} (expected YYYY-MM)")]
  BadMonth(String),

  #[error("invalid load window: {from} is after {to}")]
  WindowInverted { from: String, to: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
