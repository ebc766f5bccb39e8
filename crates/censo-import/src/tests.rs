//! End-to-end pipeline tests against an in-memory `SqliteStore`.

use std::{fs, path::Path};

use censo_core::{
  census::CensusDetails,
  school::{DependencyType, PrivateCategory},
  store::{CensusStore, Table},
};
use censo_store_sqlite::SqliteStore;
use serde_json::Value;

use crate::{
  ImportConfig, ImportSummary, Importer,
  normalize::{COUNT_COLUMNS, FLAG_COLUMNS},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

type Row = Vec<(&'static str, String)>;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn school(code: &str, name: &str, city: &str) -> Row {
  vec![
    ("NO_REGIAO", "Sudeste".into()),
    ("SG_UF", "SP".into()),
    ("NO_UF", "São Paulo".into()),
    ("NO_MUNICIPIO", city.into()),
    ("CO_ENTIDADE", code.into()),
    ("NO_ENTIDADE", name.into()),
    ("TP_DEPENDENCIA", "3".into()),
    ("TP_LOCALIZACAO", "1".into()),
    ("NO_BAIRRO", "Centro".into()),
    ("NU_TELEFONE", "32345678.0".into()),
  ]
}

fn with(mut row: Row, pairs: &[(&'static str, &str)]) -> Row {
  for (column, value) in pairs {
    match row.iter_mut().find(|(c, _)| c == column) {
      Some(entry) => entry.1 = (*value).to_owned(),
      None => row.push((*column, (*value).to_owned())),
    }
  }
  row
}

/// Write `rows` as a Latin-1, `;`-delimited census file.
fn write_census(dir: &Path, name: &str, rows: &[Row]) {
  let mut columns: Vec<&str> = Vec::new();
  for row in rows {
    for (column, _) in row {
      if !columns.contains(column) {
        columns.push(column);
      }
    }
  }

  let mut text = columns.join(";");
  text.push('\n');
  for row in rows {
    let values: Vec<&str> = columns
      .iter()
      .map(|column| {
        row
          .iter()
          .find(|(c, _)| c == column)
          .map_or("", |(_, v)| v.as_str())
      })
      .collect();
    text.push_str(&values.join(";"));
    text.push('\n');
  }

  let bytes: Vec<u8> = text
    .chars()
    .map(|c| u8::try_from(u32::from(c)).expect("latin-1 text"))
    .collect();
  fs::write(dir.join(name), bytes).unwrap();
}

fn config(dir: &Path) -> ImportConfig {
  ImportConfig {
    census_dir: dir.to_path_buf(),
    chunk_size: 2,
    ..Default::default()
  }
}

async fn import(store: &SqliteStore, dir: &Path) -> ImportSummary {
  Importer::new(store, config(dir)).run().await.unwrap()
}

async fn school_name(store: &SqliteStore, code: &str) -> String {
  let schools = store.fetch_schools(vec![code.into()]).await.unwrap();
  schools[0].attributes.name.clone()
}

async fn details_for(store: &SqliteStore, code: &str, year: i32) -> CensusDetails {
  let school_id = store.fetch_schools(vec![code.into()]).await.unwrap()[0].school_id;
  let records = store
    .fetch_census_records(vec![school_id], year)
    .await
    .unwrap();
  store
    .census_details(records[0].census_id)
    .await
    .unwrap()
    .expect("census details")
}

fn assert_leaves(value: &Value, path: &str) {
  match value {
    Value::Bool(b) => assert!(*b, "{path} is false"),
    Value::Number(n) => assert_eq!(n.as_u64(), Some(5), "{path}"),
    Value::Object(map) => {
      for (key, child) in map {
        assert_leaves(child, &format!("{path}.{key}"));
      }
    }
    other => panic!("unexpected {other:?} at {path}"),
  }
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_row_file_builds_the_whole_graph() {
  let dir = tempfile::tempdir().unwrap();
  let mut row = with(school("123", "EMEF Campinas", "Campinas"), &[("TP_DEPENDENCIA", "1")]);
  row.extend(FLAG_COLUMNS.iter().map(|c| (*c, "1".to_owned())));
  row.extend(COUNT_COLUMNS.iter().map(|c| (*c, "5".to_owned())));
  write_census(dir.path(), "censo_2022.csv", &[row]);

  let s = store().await;
  let summary = import(&s, dir.path()).await;

  assert_eq!(summary.files_processed, 1);
  assert_eq!(summary.rows_read, 1);
  assert_eq!(summary.states_created, 1);
  assert_eq!(summary.cities_created, 1);
  assert_eq!(summary.schools_created, 1);
  assert_eq!(summary.census_created, 1);
  assert_eq!(summary.school_count, 1);

  for table in [
    Table::States,
    Table::Cities,
    Table::Schools,
    Table::CensusRecords,
    Table::Infrastructure,
    Table::Education,
  ] {
    assert_eq!(s.count(table).await.unwrap(), 1, "{table:?}");
  }

  let states = s.load_states().await.unwrap();
  assert_eq!(states[0].name, "São Paulo");

  let schools = s.fetch_schools(vec!["123".into()]).await.unwrap();
  assert_eq!(schools[0].attributes.dependency, DependencyType::Federal);
  assert_eq!(schools[0].attributes.phone.as_deref(), Some("32345678"));

  let details = details_for(&s, "123", 2022).await;
  assert_leaves(&serde_json::to_value(&details.infrastructure).unwrap(), "infrastructure");
  assert_leaves(&serde_json::to_value(&details.education).unwrap(), "education");
}

#[tokio::test]
async fn sentinel_count_cleans_to_zero() {
  let dir = tempfile::tempdir().unwrap();
  let row = with(
    school("123", "EMEF", "Campinas"),
    &[("QT_SALAS_UTILIZADAS", "9999"), ("QT_EQUIP_TV", "3")],
  );
  write_census(dir.path(), "censo_2022.csv", &[row]);

  let s = store().await;
  import(&s, dir.path()).await;

  let details = details_for(&s, "123", 2022).await;
  assert_eq!(details.infrastructure.rooms, 0);
  assert_eq!(details.infrastructure.televisions, 3);
}

// ─── Latest year wins ────────────────────────────────────────────────────────

#[tokio::test]
async fn files_run_in_year_order_and_newest_attributes_win() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2023.csv", &[school("123", "Escola 2023", "Campinas")]);
  write_census(dir.path(), "censo_2021.csv", &[school("123", "Escola 2021", "Campinas")]);
  write_census(dir.path(), "censo_2022.csv", &[school("123", "Escola 2022", "Campinas")]);

  let s = store().await;
  let summary = import(&s, dir.path()).await;

  assert_eq!(summary.files_processed, 3);
  assert_eq!(summary.schools_created, 1);
  assert_eq!(summary.schools_updated, 2);
  assert_eq!(summary.census_created, 3);
  assert_eq!(school_name(&s, "123").await, "Escola 2023");
  assert_eq!(s.count(Table::CensusRecords).await.unwrap(), 3);
}

#[tokio::test]
async fn same_year_never_overwrites_or_duplicates() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[school("123", "Primeiro", "Campinas")]);
  write_census(dir.path(), "censo_2022_retificado.csv", &[school("123", "Segundo", "Campinas")]);

  let s = store().await;
  let summary = import(&s, dir.path()).await;

  assert_eq!(summary.schools_updated, 0);
  assert_eq!(summary.census_created, 1);
  assert_eq!(summary.duplicates_skipped, 1);
  assert_eq!(school_name(&s, "123").await, "Primeiro");
  assert_eq!(s.count(Table::CensusRecords).await.unwrap(), 1);
  assert_eq!(s.count(Table::Infrastructure).await.unwrap(), 1);
}

#[tokio::test]
async fn older_only_run_keeps_newer_attributes() {
  let newer = tempfile::tempdir().unwrap();
  write_census(newer.path(), "censo_2022.csv", &[school("123", "Nova", "Campinas")]);
  let older = tempfile::tempdir().unwrap();
  write_census(older.path(), "censo_2020.csv", &[school("123", "Velha", "Campinas")]);

  let s = store().await;
  import(&s, newer.path()).await;
  let summary = import(&s, older.path()).await;

  assert_eq!(summary.schools_updated, 0);
  assert_eq!(summary.census_created, 1);
  assert_eq!(school_name(&s, "123").await, "Nova");
}

#[tokio::test]
async fn reimport_replaces_census_history() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[school("123", "EMEF", "Campinas")]);

  let s = store().await;
  import(&s, dir.path()).await;
  let second = import(&s, dir.path()).await;

  // Reference data survives; census data is rebuilt from scratch. The
  // school already reflects 2022, so it is not rewritten.
  assert_eq!(second.schools_created, 0);
  assert_eq!(second.schools_updated, 0);
  assert_eq!(second.census_created, 1);
  assert_eq!(s.count(Table::Schools).await.unwrap(), 1);
  assert_eq!(s.count(Table::CensusRecords).await.unwrap(), 1);
  assert_eq!(s.count(Table::Accessibility).await.unwrap(), 1);
}

// ─── Row-level drops ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rows_without_identity_or_place_are_dropped() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[
    school("123", "Completa", "Campinas"),
    with(school("", "Sem Codigo", "Santos"), &[]),
    with(school("456", "Sem Estado", "Sorocaba"), &[("SG_UF", "")]),
    with(school("789", "Sem Cidade", ""), &[]),
  ]);

  let s = store().await;
  let summary = import(&s, dir.path()).await;

  assert_eq!(summary.rows_read, 4);
  assert_eq!(summary.rows_skipped, 3);
  assert_eq!(summary.schools_created, 1);

  // The anonymous row still introduces its city.
  let mut cities: Vec<String> = s
    .load_cities()
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.name)
    .collect();
  cities.sort();
  assert_eq!(cities, vec!["Campinas", "Santos"]);
  assert_eq!(s.count(Table::CensusRecords).await.unwrap(), 1);
}

#[tokio::test]
async fn private_schools_need_a_category() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[
    with(school("100", "Sem Categoria", "Campinas"), &[("TP_DEPENDENCIA", "4")]),
    with(
      school("200", "Comunitaria", "Campinas"),
      &[("TP_DEPENDENCIA", "4"), ("TP_CATEGORIA_ESCOLA_PRIVADA", "2")],
    ),
  ]);

  let s = store().await;
  let summary = import(&s, dir.path()).await;

  assert_eq!(summary.schools_created, 1);
  assert_eq!(summary.rows_skipped, 1);
  let schools = s.load_schools().await.unwrap();
  assert_eq!(schools.len(), 1);
  assert_eq!(schools[0].attributes.private_category, Some(PrivateCategory::Community));
}

// ─── Detail joins ────────────────────────────────────────────────────────────

#[tokio::test]
async fn dropped_row_never_supplies_details() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2021.csv", &[with(
    school("123", "Antiga", "Campinas"),
    &[("QT_SALAS_UTILIZADAS", "7")],
  )]);
  write_census(dir.path(), "censo_2022.csv", &[
    with(school("123", "Sem Categoria", "Campinas"), &[
      ("TP_DEPENDENCIA", "4"),
      ("QT_SALAS_UTILIZADAS", "1"),
    ]),
    with(school("123", "Valida", "Campinas"), &[("QT_SALAS_UTILIZADAS", "2")]),
  ]);

  let s = store().await;
  let summary = import(&s, dir.path()).await;

  assert_eq!(summary.rows_skipped, 1);
  assert_eq!(summary.schools_updated, 1);
  assert_eq!(school_name(&s, "123").await, "Valida");
  assert_eq!(details_for(&s, "123", 2022).await.infrastructure.rooms, 2);
  assert_eq!(details_for(&s, "123", 2021).await.infrastructure.rooms, 7);
}

fn detailed(code: &str, rooms: u32) -> Row {
  let rooms = rooms.to_string();
  with(school(code, "Escola", "Campinas"), &[
    ("QT_SALAS_UTILIZADAS", &rooms),
    ("QT_PROF_BIBLIOTECARIO", &rooms),
    ("QT_MAT_MED", &rooms),
  ])
}

#[tokio::test]
async fn details_follow_their_own_row_whatever_is_duplicated() {
  let codes = ["111", "222", "333"];

  for mask in 0..8u32 {
    let dir = tempfile::tempdir().unwrap();
    let earlier: Vec<Row> = codes
      .iter()
      .enumerate()
      .filter(|(i, _)| mask & (1 << i) != 0)
      .map(|(i, code)| detailed(code, 100 + i as u32))
      .collect();
    if !earlier.is_empty() {
      write_census(dir.path(), "censo_2022.csv", &earlier);
    }
    let all: Vec<Row> = codes
      .iter()
      .enumerate()
      .map(|(i, code)| detailed(code, 1 + i as u32))
      .collect();
    write_census(dir.path(), "censo_2022_z.csv", &all);

    let s = store().await;
    let summary = import(&s, dir.path()).await;
    assert_eq!(summary.census_created, 3, "mask {mask:03b}");
    assert_eq!(
      summary.duplicates_skipped,
      mask.count_ones() as usize,
      "mask {mask:03b}"
    );
    assert_eq!(s.count(Table::Infrastructure).await.unwrap(), 3);

    for (i, code) in codes.iter().enumerate() {
      let expected = if mask & (1 << i) != 0 { 100 + i as u32 } else { 1 + i as u32 };
      let details = details_for(&s, code, 2022).await;
      assert_eq!(details.infrastructure.rooms, expected, "mask {mask:03b} school {code}");
      assert_eq!(details.infrastructure.staffing.librarian, expected);
      assert_eq!(details.education.high_school.enrollments, expected);
    }
  }
}

#[tokio::test]
async fn recent_infrastructure_matches_row_order() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[
    detailed("333", 3),
    detailed("111", 1),
    detailed("222", 2),
  ]);

  let s = store().await;
  import(&s, dir.path()).await;

  let recent = s.recent_infrastructure(3).await.unwrap();
  let rooms: Vec<u32> = recent.iter().map(|r| r.infrastructure.rooms).collect();
  assert_eq!(rooms, vec![3, 1, 2]);
  let librarians: Vec<u32> = recent
    .iter()
    .map(|r| r.infrastructure.staffing.librarian)
    .collect();
  assert_eq!(librarians, vec![3, 1, 2]);
}

// ─── Run-level behaviour ─────────────────────────────────────────────────────

#[tokio::test]
async fn missing_directory_leaves_store_untouched() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[school("123", "EMEF", "Campinas")]);
  let s = store().await;
  import(&s, dir.path()).await;

  let summary = import(&s, &dir.path().join("nao-existe")).await;
  assert_eq!(summary.files_processed, 0);
  assert_eq!(summary.school_count, 1);
  assert_eq!(s.count(Table::CensusRecords).await.unwrap(), 1);
}

#[tokio::test]
async fn unusable_file_names_are_skipped_before_truncation() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2022.csv", &[school("123", "EMEF", "Campinas")]);
  let s = store().await;
  import(&s, dir.path()).await;

  let other = tempfile::tempdir().unwrap();
  write_census(other.path(), "censo_final.csv", &[school("456", "Outra", "Campinas")]);
  let summary = import(&s, other.path()).await;

  assert_eq!(summary.files_skipped, 1);
  assert_eq!(summary.files_processed, 0);
  assert_eq!(s.count(Table::CensusRecords).await.unwrap(), 1);
  assert_eq!(s.count(Table::Schools).await.unwrap(), 1);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2021.csv", &[
    school("123", "EMEF", "Campinas"),
    school("456", "EMEF Dois", "Santos"),
  ]);
  write_census(dir.path(), "censo_2022.csv", &[school("123", "EMEF", "Campinas")]);

  let s = store().await;
  let config = ImportConfig { dry_run: true, ..config(dir.path()) };
  let summary = Importer::new(&s, config).run().await.unwrap();

  assert!(summary.dry_run);
  assert_eq!(summary.files_processed, 2);
  assert_eq!(summary.states_created, 1);
  assert_eq!(summary.cities_created, 2);
  assert_eq!(summary.schools_created, 2);
  assert_eq!(summary.schools_updated, 1);
  assert_eq!(summary.census_created, 3);
  assert_eq!(summary.school_count, 0);
  for table in [Table::States, Table::Cities, Table::Schools, Table::CensusRecords] {
    assert_eq!(s.count(table).await.unwrap(), 0, "{table:?}");
  }
}

#[tokio::test]
async fn dry_run_predicts_the_real_run() {
  let dir = tempfile::tempdir().unwrap();
  write_census(dir.path(), "censo_2021.csv", &[
    school("123", "EMEF", "Campinas"),
    with(school("456", "Particular", "Campinas"), &[("TP_DEPENDENCIA", "4")]),
    school("789", "Sem Cidade", ""),
  ]);
  write_census(dir.path(), "censo_2022.csv", &[
    school("123", "EMEF", "Campinas"),
    with(
      school("456", "Particular", "Campinas"),
      &[("TP_DEPENDENCIA", "4"), ("TP_CATEGORIA_ESCOLA_PRIVADA", "1")],
    ),
  ]);
  write_census(dir.path(), "censo_2022_b.csv", &[school("123", "EMEF", "Campinas")]);

  let counts = |s: &ImportSummary| {
    (
      s.rows_skipped,
      s.states_created,
      s.cities_created,
      s.schools_created,
      s.schools_updated,
      s.census_created,
      s.duplicates_skipped,
    )
  };

  let dry_store = store().await;
  let config = ImportConfig { dry_run: true, ..config(dir.path()) };
  let dry = Importer::new(&dry_store, config).run().await.unwrap();

  let real_store = store().await;
  let real = import(&real_store, dir.path()).await;

  assert_eq!(counts(&real), (2, 1, 1, 2, 1, 3, 1));
  assert_eq!(counts(&dry), counts(&real));
}
