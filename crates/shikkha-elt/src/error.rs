//! Error type for the transform layer.

use thiserror::Error;

/// An error raised while running a pipeline stage.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] shikkha_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("stage order violated: {0}")]
  StageOrder(String),
}

impl Error {
  /// Wrap a backend error from the storage seam.
  pub(crate) fn store<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(error))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
