//! Error types for `censo-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("school {0} is private but has no private category")]
  PrivateCategoryRequired(String),

  #[error("school {0} is not private but carries a private category")]
  PrivateCategoryForbidden(String),

  #[error("unknown dependency type code: {0}")]
  UnknownDependency(i64),

  #[error("unknown private category code: {0}")]
  UnknownPrivateCategory(i64),

  #[error("unknown location code: {0}")]
  UnknownLocation(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
