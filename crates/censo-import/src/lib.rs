//! Census import pipeline.
//!
//! Reads yearly `censo_<year>.csv` files and loads them into any
//! [`censo_core::store::CensusStore`]. The stages, leaves first:
//!
//! - [`source`]: file discovery and Latin-1 CSV reading
//! - [`normalize`]: raw record to typed [`normalize::CensusRow`]
//! - [`resolve`]: run-scoped caches, new versus existing references
//! - [`load`]: chunked insert and refetch of states, cities and schools
//! - [`assemble`]: census records and their detail composites
//! - [`import`]: the orchestrator tying them together
//!
//! # Quick start
//!
//! ```no_run
//! # async fn run<S: censo_core::store::CensusStore>(store: &S) -> censo_import::Result<()> {
//! use censo_import::{ImportConfig, Importer};
//!
//! let config = ImportConfig { census_dir: "censos".into(), ..Default::default() };
//! let summary = Importer::new(store, config).run().await?;
//! println!("{} schools", summary.school_count);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod config;
pub mod error;
pub mod import;
pub mod load;
pub mod normalize;
pub mod resolve;
pub mod source;

pub use config::ImportConfig;
pub use error::{Error, Result};
pub use import::{ImportSummary, Importer};

#[cfg(test)]
mod tests;
