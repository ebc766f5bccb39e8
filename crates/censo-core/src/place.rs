//! Reference places: states and cities.
//!
//! Both are created once, on first encounter in a census file, and never
//! modified afterwards.

use serde::{Deserialize, Serialize};

// ─── State ───────────────────────────────────────────────────────────────────

/// A Brazilian federative unit, identified by its two-letter code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
  pub state_id: i64,
  /// Two-letter code, e.g. `SP`. Unique.
  pub code:     String,
  /// Full name, e.g. `São Paulo`. Unique.
  pub name:     String,
  pub region:   String,
}

/// A state that has not been persisted yet.
///
/// Ordered so that candidates collected from many rows can be deduplicated
/// with set semantics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NewState {
  pub code:   String,
  pub name:   String,
  pub region: String,
}

// ─── City ────────────────────────────────────────────────────────────────────

/// Natural key of a city. City names repeat across states, so the state code
/// is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CityKey {
  pub name:       String,
  pub state_code: String,
}

impl CityKey {
  pub fn new(name: impl Into<String>, state_code: impl Into<String>) -> Self {
    Self { name: name.into(), state_code: state_code.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
  pub city_id:    i64,
  pub name:       String,
  pub state_id:   i64,
  /// Denormalised from the owning state; part of the natural key.
  pub state_code: String,
}

impl City {
  pub fn key(&self) -> CityKey { CityKey::new(&self.name, &self.state_code) }
}

/// A city that has not been persisted yet. The owning state must already
/// exist in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCity {
  pub name:     String,
  pub state_id: i64,
}
