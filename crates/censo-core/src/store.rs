//! The `CensusStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `censo-store-sqlite`).
//! The import pipeline depends on this abstraction, not on any concrete
//! backend. Every write is set-based: callers hand over a batch and the store
//! applies it in one round trip.

use std::{collections::HashSet, future::Future};

use serde::{Deserialize, Serialize};

use crate::{
  census::{CensusDetails, CensusKey, CensusRecord, InfrastructureRecord},
  place::{City, CityKey, NewCity, NewState, State},
  school::{School, SchoolAttributes, SchoolField},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Tables that can be counted for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
  States,
  Cities,
  Schools,
  CensusRecords,
  Infrastructure,
  Education,
  Accessibility,
  Internet,
  Staffing,
  Quotas,
}

/// Default page size for [`CensusStore::search_schools`].
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Upper bound on the page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Parameters for [`CensusStore::search_schools`]. All text filters are
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct SchoolQuery {
  /// State name or two-letter code, matched exactly.
  pub state:        Option<String>,
  /// Substring of the city name.
  pub city:         Option<String>,
  /// Substring of the school name.
  pub name:         Option<String>,
  /// Substring of the neighborhood.
  pub neighborhood: Option<String>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

impl SchoolQuery {
  /// The effective page size, clamped to [`MAX_PAGE_SIZE`].
  pub fn page_size(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
  }
}

/// One row of a school listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolListing {
  pub school_id:    i64,
  pub ibge_code:    String,
  pub name:         String,
  pub street:       String,
  pub number:       String,
  pub neighborhood: String,
  pub city:         String,
  pub state_code:   String,
  pub state_name:   String,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a census store backend.
///
/// Insert operations are duplicate-safe: rows that violate a natural-key
/// uniqueness constraint are dropped, not reported as errors; any other
/// constraint violation fails the whole batch. Inserts return
/// the number of rows actually written but not their identities; callers
/// recover identities with the matching `fetch_*` method.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CensusStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Cache preload ─────────────────────────────────────────────────────

  fn load_states(&self) -> impl Future<Output = Result<Vec<State>, Self::Error>> + Send + '_;

  fn load_cities(&self) -> impl Future<Output = Result<Vec<City>, Self::Error>> + Send + '_;

  fn load_schools(&self) -> impl Future<Output = Result<Vec<School>, Self::Error>> + Send + '_;

  // ── Reference entities ────────────────────────────────────────────────

  fn insert_states(
    &self,
    states: Vec<NewState>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Fetch states whose code is in `codes`.
  fn fetch_states(
    &self,
    codes: Vec<String>,
  ) -> impl Future<Output = Result<Vec<State>, Self::Error>> + Send + '_;

  fn insert_cities(
    &self,
    cities: Vec<NewCity>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Fetch cities by `(name, state code)`.
  fn fetch_cities(
    &self,
    keys: Vec<CityKey>,
  ) -> impl Future<Output = Result<Vec<City>, Self::Error>> + Send + '_;

  fn insert_schools(
    &self,
    schools: Vec<SchoolAttributes>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Fetch schools whose IBGE code is in `codes`.
  fn fetch_schools(
    &self,
    codes: Vec<String>,
  ) -> impl Future<Output = Result<Vec<School>, Self::Error>> + Send + '_;

  /// Write `fields` of every school in `schools`, matched by `school_id`.
  /// Returns the number of rows updated.
  fn update_schools(
    &self,
    schools: Vec<School>,
    fields: Vec<SchoolField>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Census records ────────────────────────────────────────────────────

  /// The highest census year ever recorded for a school, if any. The answer
  /// survives [`CensusStore::truncate_census`], so latest-year-wins also holds
  /// across import runs.
  fn max_census_year(
    &self,
    school_id: i64,
  ) -> impl Future<Output = Result<Option<i32>, Self::Error>> + Send + '_;

  fn insert_census_records(
    &self,
    keys: Vec<CensusKey>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Fetch the census records of `year` for the given schools.
  fn fetch_census_records(
    &self,
    school_ids: Vec<i64>,
    year: i32,
  ) -> impl Future<Output = Result<Vec<CensusRecord>, Self::Error>> + Send + '_;

  /// The subset of `keys` already on record.
  fn census_exists(
    &self,
    keys: Vec<CensusKey>,
  ) -> impl Future<Output = Result<HashSet<CensusKey>, Self::Error>> + Send + '_;

  // ── Details ───────────────────────────────────────────────────────────

  /// Persist each composite as one unit: its sub-aggregates, then the
  /// infrastructure and education rows that own them. A composite whose
  /// census already has details is skipped. Returns the number written.
  fn insert_census_details(
    &self,
    details: Vec<CensusDetails>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Read back the full detail set of one census record.
  fn census_details(
    &self,
    census_id: i64,
  ) -> impl Future<Output = Result<Option<CensusDetails>, Self::Error>> + Send + '_;

  /// The `n` most recently inserted infrastructure records, oldest first.
  fn recent_infrastructure(
    &self,
    n: usize,
  ) -> impl Future<Output = Result<Vec<InfrastructureRecord>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Delete every census record and detail row. States, cities and schools
  /// are kept.
  fn truncate_census(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn count(&self, table: Table) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// List schools matching `query`, ordered by state name then school name.
  fn search_schools<'a>(
    &'a self,
    query: &'a SchoolQuery,
  ) -> impl Future<Output = Result<Vec<SchoolListing>, Self::Error>> + Send + 'a;
}
