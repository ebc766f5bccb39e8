//! Reference Resolver: run-scoped caches and new-versus-existing staging.
//!
//! Nothing here writes to the store. Staging only reads from it to learn a
//! school's latest census year, and memoises the answer.

use std::collections::{BTreeSet, HashMap, HashSet};

use censo_core::{
  place::{City, CityKey, NewState, State},
  school::{School, SchoolAttributes},
  store::CensusStore,
};
use tracing::{debug, warn};

use crate::{Error, Result, normalize::CensusRow};

// ─── Caches ──────────────────────────────────────────────────────────────────

/// Known reference entities, owned by one import run and shared by every
/// file in it.
#[derive(Debug, Default)]
pub struct Caches {
  pub states:  HashMap<String, State>,
  pub cities:  HashMap<CityKey, City>,
  pub schools: HashMap<String, School>,
  /// Highest census year on record per school id, filled lazily.
  max_years:   HashMap<i64, i32>,
}

impl Caches {
  /// Preload every state, city and school from the store.
  pub async fn load<S: CensusStore>(store: &S) -> Result<Self> {
    let states = store
      .load_states()
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    let cities = store
      .load_cities()
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    let schools = store
      .load_schools()
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    debug!(
      states = states.len(),
      cities = cities.len(),
      schools = schools.len(),
      "caches loaded"
    );

    Ok(Self {
      states:    states.into_iter().map(|s| (s.code.clone(), s)).collect(),
      cities:    cities.into_iter().map(|c| (c.key(), c)).collect(),
      schools:   schools
        .into_iter()
        .map(|s| (s.attributes.ibge_code.clone(), s))
        .collect(),
      max_years: HashMap::new(),
    })
  }

  /// The highest census year recorded for `school_id`, or 0 if none.
  pub async fn max_year<S: CensusStore>(&mut self, store: &S, school_id: i64) -> Result<i32> {
    if let Some(year) = self.max_years.get(&school_id) {
      return Ok(*year);
    }
    let year = store
      .max_census_year(school_id)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?
      .unwrap_or(0);
    self.max_years.insert(school_id, year);
    Ok(year)
  }

  /// Note that a census of `year` now exists for `school_id`. Schools never
  /// looked up keep deferring to the store.
  pub fn record_year(&mut self, school_id: i64, year: i32) {
    if let Some(max) = self.max_years.get_mut(&school_id) {
      *max = (*max).max(year);
    }
  }
}

// ─── Staging ─────────────────────────────────────────────────────────────────

/// Reference entities a file introduces, plus the rows that go on to the
/// school stage.
#[derive(Debug, Default)]
pub struct StagedReferences {
  pub states:    BTreeSet<NewState>,
  pub cities:    BTreeSet<CityKey>,
  /// Rows that identify a school.
  pub rows:      Vec<CensusRow>,
  /// Rows dropped for lacking an IBGE code.
  pub anonymous: usize,
}

/// Schools a file creates or overwrites.
#[derive(Debug, Default)]
pub struct StagedSchools {
  pub new:     Vec<SchoolAttributes>,
  /// Existing schools whose file year is newer than anything on record.
  pub updates: Vec<School>,
  /// The accepted row of every school, in file order: the first row per
  /// IBGE code that survives the city and validity checks.
  pub rows:    Vec<CensusRow>,
  /// Rows dropped for an unknown city or invalid attributes.
  pub dropped: usize,
}

/// The school `row` describes, placed in `city_id`. `None`, with a warning,
/// when the city is unknown or the attributes are invalid.
pub fn admit(row: &CensusRow, city_id: Option<i64>) -> Option<SchoolAttributes> {
  let Some(city_id) = city_id else {
    warn!(
      ibge_code = %row.ibge_code,
      city = %row.city,
      state = %row.state_code,
      "skipping school with unknown city"
    );
    return None;
  };

  let attributes = row.school_attributes(city_id);
  if let Err(e) = attributes.validate() {
    warn!(ibge_code = %row.ibge_code, error = %e, "skipping invalid school");
    return None;
  }
  Some(attributes)
}

impl Caches {
  /// Collect the states and cities `rows` mention that are not cached yet.
  pub fn stage_references(&self, rows: Vec<CensusRow>) -> StagedReferences {
    let mut staged = StagedReferences::default();

    for row in rows {
      if !row.state_code.is_empty() && !self.states.contains_key(&row.state_code) {
        staged.states.insert(NewState {
          code:   row.state_code.clone(),
          name:   row.state_name.clone(),
          region: row.region.clone(),
        });
      }
      if let Some(key) = row.city_key()
        && !self.cities.contains_key(&key)
      {
        staged.cities.insert(key);
      }

      if row.ibge_code.is_empty() {
        staged.anonymous += 1;
        continue;
      }
      staged.rows.push(row);
    }

    if staged.anonymous > 0 {
      warn!(rows = staged.anonymous, "skipping rows without an IBGE code");
    }
    staged
  }

  /// Split `rows` into new schools and latest-year-wins updates for a file
  /// of census `year`. Cities must already be cached.
  pub async fn stage_schools<S: CensusStore>(
    &mut self,
    store: &S,
    rows: Vec<CensusRow>,
    year: i32,
  ) -> Result<StagedSchools> {
    let mut staged = StagedSchools::default();
    let mut seen = HashSet::new();

    for row in rows {
      let city_id = row
        .city_key()
        .and_then(|key| self.cities.get(&key))
        .map(|city| city.city_id);
      let Some(attributes) = admit(&row, city_id) else {
        staged.dropped += 1;
        continue;
      };
      if !seen.insert(row.ibge_code.clone()) {
        continue;
      }

      match self.schools.get(&row.ibge_code).map(|s| s.school_id) {
        None => staged.new.push(attributes),
        Some(school_id) => {
          let max_year = self.max_year(store, school_id).await?;
          if year > max_year {
            staged.updates.push(School { school_id, attributes });
          } else {
            debug!(school_id, year, max_year, "keeping newer school attributes");
          }
        }
      }
      staged.rows.push(row);
    }

    Ok(staged)
  }
}
