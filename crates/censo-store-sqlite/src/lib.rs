//! SQLite implementation of [`censo_core::store::CensusStore`].
//!
//! One [`tokio_rusqlite::Connection`] serialises every statement onto its own
//! thread. Schema DDL lives in `schema`, row mapping in `encode`.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
