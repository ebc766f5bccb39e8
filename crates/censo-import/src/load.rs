//! Bulk Loader: chunked insert-then-refetch of reference entities.
//!
//! Inserts ignore natural-key conflicts and do not report identities, so
//! every insert is followed by a refetch by natural key that feeds the
//! caches.

use std::collections::BTreeSet;

use censo_core::{
  place::{CityKey, NewCity, NewState},
  school::{School, SchoolAttributes, SchoolField},
  store::CensusStore,
};
use tracing::{info, warn};

use crate::{Error, Result, resolve::Caches};

pub struct Loader<'s, S> {
  store:      &'s S,
  chunk_size: usize,
}

impl<'s, S: CensusStore> Loader<'s, S> {
  pub fn new(store: &'s S, chunk_size: usize) -> Self {
    Self { store, chunk_size: chunk_size.max(1) }
  }

  /// Persist staged states and cache them. Returns the number created.
  pub async fn load_states(
    &self,
    caches: &mut Caches,
    staged: BTreeSet<NewState>,
  ) -> Result<usize> {
    let states: Vec<NewState> = staged
      .into_iter()
      .filter(|s| !caches.states.contains_key(&s.code))
      .collect();
    if states.is_empty() {
      return Ok(0);
    }

    let mut created = 0;
    for chunk in states.chunks(self.chunk_size) {
      created += self
        .store
        .insert_states(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
    }

    let codes: Vec<String> = states.into_iter().map(|s| s.code).collect();
    for chunk in codes.chunks(self.chunk_size) {
      let fetched = self
        .store
        .fetch_states(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
      for state in fetched {
        caches.states.insert(state.code.clone(), state);
      }
    }

    info!(created, "states loaded");
    Ok(created)
  }

  /// Persist staged cities whose state is cached. Returns the number
  /// created.
  pub async fn load_cities(
    &self,
    caches: &mut Caches,
    staged: BTreeSet<CityKey>,
  ) -> Result<usize> {
    let mut keys = Vec::new();
    let mut cities = Vec::new();
    for key in staged {
      if caches.cities.contains_key(&key) {
        continue;
      }
      let Some(state) = caches.states.get(&key.state_code) else {
        warn!(city = %key.name, state = %key.state_code, "skipping city with unknown state");
        continue;
      };
      cities.push(NewCity { name: key.name.clone(), state_id: state.state_id });
      keys.push(key);
    }
    if cities.is_empty() {
      return Ok(0);
    }

    let mut created = 0;
    for chunk in cities.chunks(self.chunk_size) {
      created += self
        .store
        .insert_cities(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
    }

    for chunk in keys.chunks(self.chunk_size) {
      let fetched = self
        .store
        .fetch_cities(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
      for city in fetched {
        caches.cities.insert(city.key(), city);
      }
    }

    info!(created, "cities loaded");
    Ok(created)
  }

  /// Persist new schools and cache them. Returns the number created.
  pub async fn load_schools(
    &self,
    caches: &mut Caches,
    schools: Vec<SchoolAttributes>,
  ) -> Result<usize> {
    if schools.is_empty() {
      return Ok(0);
    }

    let mut created = 0;
    for chunk in schools.chunks(self.chunk_size) {
      created += self
        .store
        .insert_schools(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
    }

    let codes: Vec<String> = schools.into_iter().map(|s| s.ibge_code).collect();
    for chunk in codes.chunks(self.chunk_size) {
      let fetched = self
        .store
        .fetch_schools(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
      for school in fetched {
        caches
          .schools
          .insert(school.attributes.ibge_code.clone(), school);
      }
    }

    info!(created, "schools loaded");
    Ok(created)
  }

  /// Overwrite every mutable attribute of `updates` in one batched call and
  /// refresh the cache. Returns the number updated.
  pub async fn apply_updates(&self, caches: &mut Caches, updates: Vec<School>) -> Result<usize> {
    if updates.is_empty() {
      return Ok(0);
    }

    let updated = self
      .store
      .update_schools(updates.clone(), SchoolField::ALL.to_vec())
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    for school in updates {
      caches
        .schools
        .insert(school.attributes.ibge_code.clone(), school);
    }

    info!(updated, "schools updated with newer census data");
    Ok(updated)
  }
}
