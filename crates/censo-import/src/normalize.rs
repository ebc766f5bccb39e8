//! Row Normalizer: one raw census record in, one typed [`CensusRow`] out.
//!
//! Normalisation never fails. Sentinel markers and unparseable values fall
//! back to the zero value of the field's type.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use censo_core::{
  place::CityKey,
  school::{Address, DependencyType, Location, PrivateCategory, SchoolAttributes},
};

use crate::source::RawRow;

/// Raw values meaning "not applicable".
const SENTINELS: [&str; 4] = ["88888", "9999", "-1", "99999999999999"];

const TRUE_VALUES: [&str; 4] = ["1", "sim", "s", "true"];

/// Format of the academic-year columns, e.g. `15mar24:00:00:00`.
const DATE_FORMAT: &str = "%d%b%y:%H:%M:%S";

pub const DEFAULT_SCHOOL_NAME: &str = "Sem Nome";
pub const DEFAULT_REGION: &str = "Desconhecida";

/// Columns read as booleans.
pub const FLAG_COLUMNS: [&str; 57] = [
  "IN_ACESSIBILIDADE_CORRIMAO",
  "IN_ACESSIBILIDADE_ELEVADOR",
  "IN_ACESSIBILIDADE_PISOS_TATEIS",
  "IN_ACESSIBILIDADE_VAO_LIVRE",
  "IN_ACESSIBILIDADE_RAMPAS",
  "IN_ACESSIBILIDADE_SINAL_SONORO",
  "IN_ACESSIBILIDADE_SINAL_TATIL",
  "IN_ACESSIBILIDADE_SINAL_VISUAL",
  "IN_INTERNET_ALUNOS",
  "IN_INTERNET_ADMINISTRATIVO",
  "IN_INTERNET_APRENDIZAGEM",
  "IN_INTERNET_COMUNIDADE",
  "IN_ACESSO_INTERNET_COMPUTADOR",
  "IN_ACES_INTERNET_DISP_PESSOAIS",
  "N_RESERVA_PPI",
  "IN_RESERVA_RENDA",
  "IN_RESERVA_PUBLICA",
  "IN_RESERVA_PCD",
  "IN_RESERVA_OUTROS",
  "IN_EDUCACAO_INDIGENA",
  "IN_EXAME_SELECAO",
  "IN_ORGAO_GREMIO_ESTUDANTIL",
  "IN_EAD",
  "IN_ALIMENTACAO",
  "IN_REDES_SOCIAIS",
  "IN_AGUA_POTAVEL",
  "IN_ALMOXARIFADO",
  "IN_AREA_VERDE",
  "IN_AUDITORIO",
  "IN_BANHEIRO",
  "IN_BANHEIRO_EI",
  "IN_BANHEIRO_PNE",
  "IN_BANHEIRO_FUNCIONARIOS",
  "IN_BANHEIRO_CHUVEIRO",
  "IN_BIBLIOTECA",
  "IN_COZINHA",
  "IN_DORMITORIO_ALUNO",
  "IN_DORMITORIO_PROFESSOR",
  "IN_LABORATORIO_CIENCIAS",
  "IN_LABORATORIO_INFORMATICA",
  "IN_PATIO_COBERTO",
  "IN_PATIO_DESCOBERTO",
  "IN_PARQUE_INFANTIL",
  "IN_PISCINA",
  "IN_QUADRA_ESPORTES_COBERTA",
  "IN_QUADRA_ESPORTES_DESCOBERTA",
  "IN_SALA_ATELIE_ARTES",
  "IN_SALA_MUSICA_CORAL",
  "IN_SALA_ESTUDIO_DANCA",
  "IN_SALA_MULTIUSO",
  "IN_SALA_DIRETORIA",
  "IN_SALA_LEITURA",
  "IN_SALA_PROFESSOR",
  "IN_SALA_REPOUSO_ALUNO",
  "IN_SECRETARIA",
  "IN_SALA_ATENDIMENTO_ESPECIAL",
  "IN_TERREIRAO",
];

/// Columns read as non-negative counts.
pub const COUNT_COLUMNS: [&str; 60] = [
  "QT_SALAS_UTILIZADAS",
  "QT_SALAS_UTILIZADAS_FORA",
  "QT_SALAS_UTILIZADAS_DENTRO",
  "QT_SALAS_UTILIZA_CLIMATIZADAS",
  "QT_SALAS_UTILIZADAS_ACESSIVEIS",
  "QT_EQUIP_DVD",
  "QT_EQUIP_SOM",
  "QT_EQUIP_TV",
  "QT_EQUIP_LOUSA_DIGITAL",
  "QT_EQUIP_MULTIMIDIA",
  "QT_DESKTOP_ALUNO",
  "QT_COMP_PORTATIL_ALUNO",
  "QT_TABLET_ALUNO",
  "QT_PROF_ADMINISTRATIVOS",
  "QT_PROF_SERVICOS_GERAIS",
  "QT_PROF_BIBLIOTECARIO",
  "QT_PROF_SAUDE",
  "QT_PROF_COORDENADOR",
  "QT_PROF_FONOAUDIOLOGO",
  "QT_PROF_NUTRICIONISTA",
  "QT_PROF_PSICOLOGO",
  "QT_PROF_ALIMENTACAO",
  "QT_PROF_PEDAGOGIA",
  "QT_PROF_SECRETARIO",
  "QT_PROF_SEGURANCA",
  "QT_PROF_MONITORES",
  "QT_PROF_GESTAO",
  "QT_PROF_ASSIST_SOCIAL",
  "QT_MAT_INF",
  "QT_MAT_INF_CRE",
  "QT_MAT_INF_PRE",
  "QT_MAT_FUND",
  "QT_MAT_FUND_AI",
  "QT_MAT_FUND_AF",
  "QT_MAT_MED",
  "QT_MAT_MED_CT",
  "QT_MAT_PROF",
  "QT_MAT_PROF_TEC",
  "QT_MAT_EJA",
  "QT_MAT_EJA_FUND",
  "QT_MAT_EJA_FUND_AI",
  "QT_MAT_EJA_FUND_AF",
  "QT_MAT_EJA_MED",
  "QT_MAT_ESP",
  "QT_DOC_INF",
  "QT_DOC_INF_CRE",
  "QT_DOC_INF_PRE",
  "QT_DOC_FUND",
  "QT_DOC_FUND_AI",
  "QT_DOC_FUND_AF",
  "QT_DOC_MED",
  "QT_DOC_MED_CT",
  "QT_DOC_PROF",
  "QT_DOC_PROF_TEC",
  "QT_DOC_EJA",
  "QT_DOC_EJA_FUND",
  "QT_DOC_EJA_FUND_AI",
  "QT_DOC_EJA_FUND_AF",
  "QT_DOC_EJA_MED",
  "QT_DOC_ESP",
];

// ─── Cleaned row ─────────────────────────────────────────────────────────────

/// A census record after cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusRow {
  pub state_code:          String,
  pub state_name:          String,
  pub region:              String,
  pub city:                String,
  /// Empty when the record does not identify a school.
  pub ibge_code:           String,
  pub school_name:         String,
  pub dependency:          DependencyType,
  pub private_category:    Option<PrivateCategory>,
  pub location:            Location,
  pub address:             Address,
  pub area_code:           Option<String>,
  pub phone:               Option<String>,
  pub academic_year_start: Option<NaiveDate>,
  pub academic_year_end:   Option<NaiveDate>,
  /// Flag columns that read as true.
  flags:                   HashSet<&'static str>,
  /// Count columns with a non-zero value.
  counts:                  HashMap<&'static str, u32>,
}

impl CensusRow {
  /// The cleaned value of a flag column. Unknown columns read as false.
  pub fn flag(&self, column: &str) -> bool { self.flags.contains(column) }

  /// The cleaned value of a count column. Unknown columns read as 0.
  pub fn count(&self, column: &str) -> u32 { self.counts.get(column).copied().unwrap_or(0) }

  /// `None` when either half of the key is blank.
  pub fn city_key(&self) -> Option<CityKey> {
    (!self.city.is_empty() && !self.state_code.is_empty())
      .then(|| CityKey::new(&self.city, &self.state_code))
  }

  /// The school attributes this row describes, placed in `city_id`.
  pub fn school_attributes(&self, city_id: i64) -> SchoolAttributes {
    SchoolAttributes {
      ibge_code: self.ibge_code.clone(),
      name: self.school_name.clone(),
      dependency: self.dependency,
      private_category: self.private_category,
      location: self.location,
      city_id,
      address: self.address.clone(),
      area_code: self.area_code.clone(),
      phone: self.phone.clone(),
      academic_year_start: self.academic_year_start,
      academic_year_end: self.academic_year_end,
    }
  }
}

// ─── Field parsers ───────────────────────────────────────────────────────────

/// Trim and blank out sentinel markers.
pub fn clean_text(raw: Option<&str>) -> String {
  let value = raw.unwrap_or_default().trim();
  if value.eq_ignore_ascii_case("nan") || SENTINELS.contains(&value) {
    String::new()
  } else {
    value.to_owned()
  }
}

pub fn parse_flag(raw: Option<&str>) -> bool {
  let value = clean_text(raw).to_lowercase();
  TRUE_VALUES.contains(&value.as_str())
}

/// A non-negative integer; `,` is accepted as the decimal separator and the
/// fraction is dropped.
pub fn parse_count(raw: Option<&str>) -> u32 {
  let value = clean_text(raw).replace(',', ".");
  match value.parse::<f64>() {
    Ok(n) if n.is_finite() && n >= 0.0 => n.trunc().min(f64::from(u32::MAX)) as u32,
    _ => 0,
  }
}

/// Phone-like identifiers: kept as text, minus the `.0` left behind when
/// they went through a float.
pub fn parse_identifier(raw: Option<&str>) -> Option<String> {
  let value = clean_text(raw);
  let value = value.strip_suffix(".0").unwrap_or(&value);
  (!value.is_empty()).then(|| value.to_owned())
}

pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
  let value = clean_text(raw);
  NaiveDateTime::parse_from_str(&value, DATE_FORMAT)
    .ok()
    .map(|dt| dt.date())
}

/// An integer code, tolerating a float rendering such as `4.0`.
pub fn parse_code(raw: Option<&str>) -> Option<i64> {
  let value = clean_text(raw);
  value.parse::<i64>().ok().or_else(|| {
    value
      .parse::<f64>()
      .ok()
      .filter(|n| n.is_finite() && n.fract() == 0.0)
      .map(|n| n as i64)
  })
}

// ─── Row ─────────────────────────────────────────────────────────────────────

pub fn normalize(raw: &RawRow<'_>) -> CensusRow {
  let text = |column: &str| clean_text(raw.get(column));
  let or_default = |value: String, default: &str| {
    if value.is_empty() { default.to_owned() } else { value }
  };

  let flags = FLAG_COLUMNS
    .iter()
    .copied()
    .filter(|column| parse_flag(raw.get(column)))
    .collect();
  let counts = COUNT_COLUMNS
    .iter()
    .filter_map(|&column| {
      let n = parse_count(raw.get(column));
      (n > 0).then_some((column, n))
    })
    .collect();

  CensusRow {
    state_code: text("SG_UF"),
    state_name: text("NO_UF"),
    region: or_default(text("NO_REGIAO"), DEFAULT_REGION),
    city: text("NO_MUNICIPIO"),
    ibge_code: text("CO_ENTIDADE"),
    school_name: or_default(text("NO_ENTIDADE"), DEFAULT_SCHOOL_NAME),
    dependency: parse_code(raw.get("TP_DEPENDENCIA"))
      .and_then(|code| DependencyType::from_code(code).ok())
      .unwrap_or_default(),
    private_category: parse_code(raw.get("TP_CATEGORIA_ESCOLA_PRIVADA"))
      .and_then(|code| PrivateCategory::from_code(code).ok()),
    location: parse_code(raw.get("TP_LOCALIZACAO"))
      .and_then(|code| Location::from_code(code).ok())
      .unwrap_or_default(),
    address: Address {
      street:       text("DS_ENDERECO"),
      number:       text("NU_ENDERECO"),
      complement:   text("DS_COMPLEMENTO"),
      neighborhood: text("NO_BAIRRO"),
      postal_code:  text("CO_CEP"),
    },
    area_code: parse_identifier(raw.get("NU_DDD")),
    phone: parse_identifier(raw.get("NU_TELEFONE")),
    academic_year_start: parse_date(raw.get("DT_ANO_LETIVO_INICIO")),
    academic_year_end: parse_date(raw.get("DT_ANO_LETIVO_TERMINO")),
    flags,
    counts,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Header;

  fn row_from(pairs: &[(&str, &str)]) -> CensusRow {
    let header = Header::new(pairs.iter().map(|(k, _)| *k));
    let values: Vec<String> = pairs.iter().map(|(_, v)| (*v).to_owned()).collect();
    normalize(&header.row(&values))
  }

  #[test]
  fn flag_table_is_case_insensitive() {
    for raw in ["1", "sim", "S", "TRUE", " Sim "] {
      assert!(parse_flag(Some(raw)), "{raw:?}");
    }
    for raw in ["0", "não", "N", "nao", "", "2", "yes", "9999"] {
      assert!(!parse_flag(Some(raw)), "{raw:?}");
    }
    assert!(!parse_flag(None));
  }

  #[test]
  fn counts_drop_sentinels_and_garbage() {
    assert_eq!(parse_count(Some("9999")), 0);
    assert_eq!(parse_count(Some("88888")), 0);
    assert_eq!(parse_count(Some("-1")), 0);
    assert_eq!(parse_count(Some("-3")), 0);
    assert_eq!(parse_count(Some("abc")), 0);
    assert_eq!(parse_count(None), 0);
    assert_eq!(parse_count(Some(" 12 ")), 12);
    assert_eq!(parse_count(Some("7,9")), 7);
  }

  #[test]
  fn identifiers_lose_float_suffix() {
    assert_eq!(parse_identifier(Some("33334444.0")), Some("33334444".into()));
    assert_eq!(parse_identifier(Some("11")), Some("11".into()));
    assert_eq!(parse_identifier(Some("nan")), None);
    assert_eq!(parse_identifier(Some("")), None);
  }

  #[test]
  fn dates_use_census_format() {
    assert_eq!(
      parse_date(Some("15mar24:00:00:00")),
      NaiveDate::from_ymd_opt(2024, 3, 15)
    );
    assert_eq!(
      parse_date(Some("01FEB23:00:00:00")),
      NaiveDate::from_ymd_opt(2023, 2, 1)
    );
    assert_eq!(parse_date(Some("2024-03-15")), None);
    assert_eq!(parse_date(None), None);
  }

  #[test]
  fn missing_columns_take_defaults() {
    let row = row_from(&[("CO_ENTIDADE", "35000001")]);
    assert_eq!(row.ibge_code, "35000001");
    assert_eq!(row.school_name, DEFAULT_SCHOOL_NAME);
    assert_eq!(row.region, DEFAULT_REGION);
    assert_eq!(row.dependency, DependencyType::Federal);
    assert_eq!(row.location, Location::Urban);
    assert_eq!(row.private_category, None);
    assert_eq!(row.address, Address::default());
    assert!(!row.flag("IN_BIBLIOTECA"));
    assert_eq!(row.count("QT_SALAS_UTILIZADAS"), 0);
    assert_eq!(row.city_key(), None);
  }

  #[test]
  fn codes_and_text_are_cleaned() {
    let row = row_from(&[
      ("SG_UF", " SP "),
      ("NO_MUNICIPIO", "Campinas"),
      ("NO_ENTIDADE", "nan"),
      ("TP_DEPENDENCIA", "4.0"),
      ("TP_CATEGORIA_ESCOLA_PRIVADA", "3"),
      ("TP_LOCALIZACAO", "7"),
      ("NU_ENDERECO", "88888"),
      ("IN_BIBLIOTECA", "Sim"),
      ("QT_SALAS_UTILIZADAS", "12"),
    ]);
    assert_eq!(row.state_code, "SP");
    assert_eq!(row.school_name, DEFAULT_SCHOOL_NAME);
    assert_eq!(row.dependency, DependencyType::Private);
    assert_eq!(row.private_category, Some(PrivateCategory::Confessional));
    assert_eq!(row.location, Location::Urban);
    assert_eq!(row.address.number, "");
    assert!(row.flag("IN_BIBLIOTECA"));
    assert_eq!(row.count("QT_SALAS_UTILIZADAS"), 12);
    assert_eq!(row.city_key(), Some(CityKey::new("Campinas", "SP")));
  }

  #[test]
  fn zero_private_category_is_absent() {
    let row = row_from(&[("TP_DEPENDENCIA", "2"), ("TP_CATEGORIA_ESCOLA_PRIVADA", "0")]);
    assert_eq!(row.dependency, DependencyType::State);
    assert_eq!(row.private_category, None);
  }
}
