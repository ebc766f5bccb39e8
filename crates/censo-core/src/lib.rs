//! Domain model of the Censo school catalog.
//!
//! Places ([`place`]), schools ([`school`]) and the yearly census data that
//! hangs off them ([`census`]), plus the [`store::CensusStore`] trait every
//! storage backend implements. No CSV or SQL lives here.

pub mod census;
pub mod error;
pub mod place;
pub mod school;
pub mod store;

pub use error::{Error, Result};
