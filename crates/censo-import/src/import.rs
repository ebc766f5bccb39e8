//! Import Orchestrator.
//!
//! One run discovers the census files, orders them by year, replaces the
//! census tables and then pushes each file through normalise, resolve, load
//! and assemble. Files are processed strictly in sequence; every store call
//! is awaited before the next one starts.

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
};

use censo_core::{
  place::CityKey,
  store::{CensusStore, Table},
};
use serde::Serialize;
use tracing::{Instrument as _, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
  Error, ImportConfig, Result,
  assemble::Assembler,
  load::Loader,
  normalize::{CensusRow, normalize},
  resolve::{Caches, StagedSchools, admit},
  source,
};

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Totals for one import run. In a dry run the `*_created` and
/// `schools_updated` fields are would-be counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
  pub run_id:             Uuid,
  pub dry_run:            bool,
  pub files_processed:    usize,
  pub files_skipped:      usize,
  pub rows_read:          usize,
  pub rows_skipped:       usize,
  pub states_created:     usize,
  pub cities_created:     usize,
  pub schools_created:    usize,
  pub schools_updated:    usize,
  pub census_created:     usize,
  pub duplicates_skipped: usize,
  /// Schools in the store once the run is over.
  pub school_count:       u64,
}

/// A discovered file with the year its name carries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CensusFile {
  year: i32,
  path: PathBuf,
}

/// What a dry run has staged so far, standing in for the writes a real run
/// would have made.
#[derive(Debug, Default)]
struct DryRunTally {
  states: HashSet<String>,
  cities: HashSet<CityKey>,
  /// Latest staged census year per IBGE code.
  years:  HashMap<String, i32>,
  census: HashSet<(String, i32)>,
}

// ─── Importer ────────────────────────────────────────────────────────────────

pub struct Importer<'s, S> {
  store:  &'s S,
  config: ImportConfig,
}

impl<'s, S: CensusStore> Importer<'s, S> {
  pub fn new(store: &'s S, config: ImportConfig) -> Self { Self { store, config } }

  /// Run a full import.
  ///
  /// A missing directory, or one without any usable census file, ends the
  /// run before anything is written. Unreadable files are skipped; store
  /// failures abort the run.
  pub async fn run(&self) -> Result<ImportSummary> {
    let run_id = Uuid::new_v4();
    let span = info_span!("import", %run_id, dry_run = self.config.dry_run);
    self.run_inner(run_id).instrument(span).await
  }

  async fn run_inner(&self, run_id: Uuid) -> Result<ImportSummary> {
    self.config.validate()?;

    let mut summary = ImportSummary {
      run_id,
      dry_run: self.config.dry_run,
      ..Default::default()
    };

    let files = self.discover(&mut summary)?;
    if files.is_empty() {
      summary.school_count = self.school_count().await?;
      return Ok(summary);
    }

    if self.config.dry_run {
      info!("dry run; census tables left in place");
    } else {
      self
        .store
        .truncate_census()
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
      info!("existing census data removed");
    }

    let mut caches = Caches::load(self.store).await?;
    let mut tally = DryRunTally::default();

    for file in &files {
      info!(year = file.year, path = %file.path.display(), "importing census file");

      let rows = match read_census(&file.path) {
        Ok(rows) => rows,
        Err(e) => {
          error!(path = %file.path.display(), error = %e, "cannot read census file; skipping");
          summary.files_skipped += 1;
          continue;
        }
      };
      summary.rows_read += rows.len();

      if self.config.dry_run {
        self
          .stage_dry(&mut caches, &mut tally, rows, file.year, &mut summary)
          .await?;
      } else {
        self
          .import_rows(&mut caches, rows, file.year, &mut summary)
          .await?;
      }
      summary.files_processed += 1;
    }

    summary.school_count = self.school_count().await?;
    info!(
      files = summary.files_processed,
      skipped = summary.files_skipped,
      rows = summary.rows_read,
      schools = summary.school_count,
      "census import finished"
    );
    Ok(summary)
  }

  /// Usable census files in ascending year order.
  fn discover(&self, summary: &mut ImportSummary) -> Result<Vec<CensusFile>> {
    let dir = &self.config.census_dir;
    if !dir.is_dir() {
      warn!(dir = %dir.display(), "census directory not found; nothing to import");
      return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for path in source::census_files(dir)? {
      let name = file_name(&path);
      match source::year_from_file_name(&name) {
        Ok(year) => files.push(CensusFile { year, path }),
        Err(e) => {
          warn!(error = %e, "skipping census file");
          summary.files_skipped += 1;
        }
      }
    }

    if files.is_empty() {
      warn!(dir = %dir.display(), "no census files found; nothing to import");
    }
    files.sort();
    Ok(files)
  }

  async fn import_rows(
    &self,
    caches: &mut Caches,
    rows: Vec<CensusRow>,
    year: i32,
    summary: &mut ImportSummary,
  ) -> Result<()> {
    let loader = Loader::new(self.store, self.config.chunk_size);
    let assembler = Assembler::new(self.store, self.config.chunk_size);

    let references = caches.stage_references(rows);
    summary.rows_skipped += references.anonymous;
    summary.states_created += loader.load_states(caches, references.states).await?;
    summary.cities_created += loader.load_cities(caches, references.cities).await?;

    let StagedSchools { new, updates, rows, dropped } = caches
      .stage_schools(self.store, references.rows, year)
      .await?;
    summary.rows_skipped += dropped;
    summary.schools_created += loader.load_schools(caches, new).await?;
    summary.schools_updated += loader.apply_updates(caches, updates).await?;

    let census = assembler.assemble(caches, &rows, year).await?;
    summary.census_created += census.records;
    summary.duplicates_skipped += census.duplicates;
    Ok(())
  }

  /// Stage a file without writing to the store, counting what a real run
  /// would do with it.
  async fn stage_dry(
    &self,
    caches: &mut Caches,
    tally: &mut DryRunTally,
    rows: Vec<CensusRow>,
    year: i32,
    summary: &mut ImportSummary,
  ) -> Result<()> {
    let references = caches.stage_references(rows);
    summary.rows_skipped += references.anonymous;

    for state in references.states {
      if tally.states.insert(state.code) {
        summary.states_created += 1;
      }
    }
    for city in references.cities {
      if tally.cities.insert(city) {
        summary.cities_created += 1;
      }
    }

    let mut in_file = HashSet::new();
    for row in references.rows {
      // Staged cities have no id yet; any placeholder passes the check.
      let city_id = row.city_key().and_then(|key| {
        caches
          .cities
          .get(&key)
          .map(|city| city.city_id)
          .or_else(|| tally.cities.contains(&key).then_some(0))
      });
      if admit(&row, city_id).is_none() {
        summary.rows_skipped += 1;
        continue;
      }
      if !in_file.insert(row.ibge_code.clone()) {
        continue;
      }

      let prior = match tally.years.get(&row.ibge_code) {
        Some(&staged) => Some(staged),
        None => match caches.schools.get(&row.ibge_code).map(|s| s.school_id) {
          Some(school_id) => Some(caches.max_year(self.store, school_id).await?),
          None => None,
        },
      };
      match prior {
        None => summary.schools_created += 1,
        Some(prior) if year > prior => summary.schools_updated += 1,
        Some(_) => {}
      }
      let latest = prior.map_or(year, |prior| prior.max(year));
      tally.years.insert(row.ibge_code.clone(), latest);

      if tally.census.insert((row.ibge_code, year)) {
        summary.census_created += 1;
      } else {
        summary.duplicates_skipped += 1;
      }
    }
    Ok(())
  }

  async fn school_count(&self) -> Result<u64> {
    self
      .store
      .count(Table::Schools)
      .await
      .map_err(|e| Error::Store(Box::new(e)))
  }
}

/// Read and normalise every row of a census file.
pub fn read_census(path: &Path) -> Result<Vec<CensusRow>> {
  let mut rows = Vec::new();
  source::read_rows(path, |raw| rows.push(normalize(&raw)))?;
  Ok(rows)
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default()
}
