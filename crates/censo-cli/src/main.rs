//! `censo`: load school census files into SQLite and inspect the result.
//!
//! Reads `censo.toml` (or the path given with `--config`), layered under
//! `CENSO_*` environment variables. Command-line flags win over both.
//!
//! # Usage
//!
//! ```text
//! censo import --dir ./censos
//! censo import --dry-run --json
//! censo schools --state SP --name escola --limit 10
//! censo stats
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use censo_core::store::{CensusStore as _, SchoolQuery, Table};
use censo_import::{ImportConfig, ImportSummary, Importer};
use censo_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "School census importer")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "censo.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `store_path`.
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Replace the census history with the files in the census directory.
  Import {
    /// Directory holding `censo_<year>.csv` files; overrides `census_dir`.
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Rows per store round trip; overrides `chunk_size`.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Parse and stage everything, write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
  },

  /// List schools, ordered by state name then school name.
  Schools {
    /// State name or two-letter code.
    #[arg(long)]
    state: Option<String>,

    /// Part of the city name.
    #[arg(long)]
    city: Option<String>,

    /// Part of the school name.
    #[arg(long)]
    name: Option<String>,

    /// Part of the neighborhood.
    #[arg(long)]
    neighborhood: Option<String>,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    offset: Option<usize>,

    /// Print the listing as JSON.
    #[arg(long)]
    json: bool,
  },

  /// Row counts for every table.
  Stats,
}

/// Tables reported by `censo stats`, in print order.
const STAT_TABLES: [(&str, Table); 10] = [
  ("states", Table::States),
  ("cities", Table::Cities),
  ("schools", Table::Schools),
  ("census records", Table::CensusRecords),
  ("infrastructure", Table::Infrastructure),
  ("education", Table::Education),
  ("accessibility", Table::Accessibility),
  ("internet", Table::Internet),
  ("staffing", Table::Staffing),
  ("quotas", Table::Quotas),
];

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("CENSO"))
    .build()
    .context("failed to read config file")?;

  let mut import_cfg: ImportConfig = settings
    .try_deserialize()
    .context("failed to deserialise ImportConfig")?;

  if let Some(store) = cli.store {
    import_cfg.store_path = store;
  }
  let store_path = expand_tilde(&import_cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Import { dir, chunk_size, dry_run, json } => {
      if let Some(dir) = dir {
        import_cfg.census_dir = dir;
      }
      if let Some(chunk_size) = chunk_size {
        import_cfg.chunk_size = chunk_size;
      }
      import_cfg.census_dir = expand_tilde(&import_cfg.census_dir);
      import_cfg.dry_run |= dry_run;

      let summary = Importer::new(&store, import_cfg)
        .run()
        .await
        .context("census import failed")?;

      if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
      } else {
        print_summary(&summary);
      }
    }

    Command::Schools { state, city, name, neighborhood, limit, offset, json } => {
      let query = SchoolQuery { state, city, name, neighborhood, limit, offset };
      let schools = store
        .search_schools(&query)
        .await
        .context("school search failed")?;

      if json {
        println!("{}", serde_json::to_string_pretty(&schools)?);
      } else {
        for s in &schools {
          println!(
            "{:<10} {:<50} {}, {} - {} / {}",
            s.ibge_code, s.name, s.street, s.number, s.neighborhood, s.city
          );
        }
        if schools.is_empty() {
          println!("no schools found");
        }
      }
    }

    Command::Stats => {
      for (label, table) in STAT_TABLES {
        let n = store
          .count(table)
          .await
          .with_context(|| format!("failed to count {label}"))?;
        println!("{label:<16} {n}");
      }
    }
  }

  Ok(())
}

fn print_summary(summary: &ImportSummary) {
  let mode = if summary.dry_run { " (dry run)" } else { "" };
  println!("import {}{mode}", summary.run_id);
  println!("  files processed     {}", summary.files_processed);
  println!("  files skipped       {}", summary.files_skipped);
  println!("  rows read           {}", summary.rows_read);
  println!("  rows skipped        {}", summary.rows_skipped);
  println!("  states created      {}", summary.states_created);
  println!("  cities created      {}", summary.cities_created);
  println!("  schools created     {}", summary.schools_created);
  println!("  schools updated     {}", summary.schools_updated);
  println!("  census created      {}", summary.census_created);
  println!("  duplicates skipped  {}", summary.duplicates_skipped);
  println!("  schools in store    {}", summary.school_count);
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn import_flags_parse() {
    let cli = Cli::try_parse_from([
      "censo", "--store", "x.db", "import", "--dir", "data", "--dry-run",
    ])
    .unwrap();
    assert_eq!(cli.store, Some(PathBuf::from("x.db")));
    match cli.command {
      Command::Import { dir, dry_run, json, .. } => {
        assert_eq!(dir, Some(PathBuf::from("data")));
        assert!(dry_run);
        assert!(!json);
      }
      other => panic!("unexpected command {other:?}"),
    }
  }

  #[test]
  fn relative_paths_are_left_alone() {
    assert_eq!(expand_tilde(Path::new("censos")), PathBuf::from("censos"));
  }
}
