//! Census Assembler: one census record per school per file, and the detail
//! composite that hangs off it.
//!
//! Each recovered census record is joined back to its source row by
//! `school_id`, and its details travel to the store as one
//! [`CensusDetails`] value.

use std::collections::{HashMap, HashSet};

use censo_core::{
  census::{
    Accessibility, CensusDetails, CensusKey, Education, Infrastructure, Internet, Quotas,
    StageCounts, Staffing,
  },
  store::CensusStore,
};
use tracing::{info, warn};

use crate::{Error, Result, normalize::CensusRow, resolve::Caches};

// ─── Detail builders ─────────────────────────────────────────────────────────

pub fn accessibility(row: &CensusRow) -> Accessibility {
  Accessibility {
    handrail:       row.flag("IN_ACESSIBILIDADE_CORRIMAO"),
    elevator:       row.flag("IN_ACESSIBILIDADE_ELEVADOR"),
    tactile_floor:  row.flag("IN_ACESSIBILIDADE_PISOS_TATEIS"),
    clear_span:     row.flag("IN_ACESSIBILIDADE_VAO_LIVRE"),
    ramps:          row.flag("IN_ACESSIBILIDADE_RAMPAS"),
    sound_signal:   row.flag("IN_ACESSIBILIDADE_SINAL_SONORO"),
    tactile_signal: row.flag("IN_ACESSIBILIDADE_SINAL_TATIL"),
    visual_signal:  row.flag("IN_ACESSIBILIDADE_SINAL_VISUAL"),
  }
}

pub fn internet(row: &CensusRow) -> Internet {
  Internet {
    students:          row.flag("IN_INTERNET_ALUNOS"),
    administrative:    row.flag("IN_INTERNET_ADMINISTRATIVO"),
    learning:          row.flag("IN_INTERNET_APRENDIZAGEM"),
    community:         row.flag("IN_INTERNET_COMUNIDADE"),
    student_computers: row.flag("IN_ACESSO_INTERNET_COMPUTADOR"),
    personal_devices:  row.flag("IN_ACES_INTERNET_DISP_PESSOAIS"),
  }
}

pub fn staffing(row: &CensusRow) -> Staffing {
  Staffing {
    administrative:   row.count("QT_PROF_ADMINISTRATIVOS"),
    general_services: row.count("QT_PROF_SERVICOS_GERAIS"),
    librarian:        row.count("QT_PROF_BIBLIOTECARIO"),
    health:           row.count("QT_PROF_SAUDE"),
    coordinator:      row.count("QT_PROF_COORDENADOR"),
    speech_therapist: row.count("QT_PROF_FONOAUDIOLOGO"),
    nutritionist:     row.count("QT_PROF_NUTRICIONISTA"),
    psychologist:     row.count("QT_PROF_PSICOLOGO"),
    food_service:     row.count("QT_PROF_ALIMENTACAO"),
    pedagogy:         row.count("QT_PROF_PEDAGOGIA"),
    secretary:        row.count("QT_PROF_SECRETARIO"),
    security:         row.count("QT_PROF_SEGURANCA"),
    monitors:         row.count("QT_PROF_MONITORES"),
    management:       row.count("QT_PROF_GESTAO"),
    social_worker:    row.count("QT_PROF_ASSIST_SOCIAL"),
  }
}

pub fn infrastructure(row: &CensusRow) -> Infrastructure {
  Infrastructure {
    drinking_water:      row.flag("IN_AGUA_POTAVEL"),
    storeroom:           row.flag("IN_ALMOXARIFADO"),
    green_area:          row.flag("IN_AREA_VERDE"),
    auditorium:          row.flag("IN_AUDITORIO"),
    bathroom:            row.flag("IN_BANHEIRO"),
    child_bathroom:      row.flag("IN_BANHEIRO_EI"),
    accessible_bathroom: row.flag("IN_BANHEIRO_PNE"),
    staff_bathroom:      row.flag("IN_BANHEIRO_FUNCIONARIOS"),
    shower:              row.flag("IN_BANHEIRO_CHUVEIRO"),
    library:             row.flag("IN_BIBLIOTECA"),
    kitchen:             row.flag("IN_COZINHA"),
    student_dormitory:   row.flag("IN_DORMITORIO_ALUNO"),
    teacher_dormitory:   row.flag("IN_DORMITORIO_PROFESSOR"),
    science_lab:         row.flag("IN_LABORATORIO_CIENCIAS"),
    computer_lab:        row.flag("IN_LABORATORIO_INFORMATICA"),
    covered_patio:       row.flag("IN_PATIO_COBERTO"),
    open_patio:          row.flag("IN_PATIO_DESCOBERTO"),
    playground:          row.flag("IN_PARQUE_INFANTIL"),
    pool:                row.flag("IN_PISCINA"),
    covered_court:       row.flag("IN_QUADRA_ESPORTES_COBERTA"),
    open_court:          row.flag("IN_QUADRA_ESPORTES_DESCOBERTA"),
    arts_room:           row.flag("IN_SALA_ATELIE_ARTES"),
    music_room:          row.flag("IN_SALA_MUSICA_CORAL"),
    dance_studio:        row.flag("IN_SALA_ESTUDIO_DANCA"),
    multipurpose_room:   row.flag("IN_SALA_MULTIUSO"),
    principal_office:    row.flag("IN_SALA_DIRETORIA"),
    reading_room:        row.flag("IN_SALA_LEITURA"),
    teachers_room:       row.flag("IN_SALA_PROFESSOR"),
    student_rest_room:   row.flag("IN_SALA_REPOUSO_ALUNO"),
    secretariat:         row.flag("IN_SECRETARIA"),
    special_care_room:   row.flag("IN_SALA_ATENDIMENTO_ESPECIAL"),
    recreation_yard:     row.flag("IN_TERREIRAO"),
    food_service:        row.flag("IN_ALIMENTACAO"),
    social_media:        row.flag("IN_REDES_SOCIAIS"),
    rooms:               row.count("QT_SALAS_UTILIZADAS"),
    rooms_outside:       row.count("QT_SALAS_UTILIZADAS_FORA"),
    rooms_inside:        row.count("QT_SALAS_UTILIZADAS_DENTRO"),
    rooms_climatized:    row.count("QT_SALAS_UTILIZA_CLIMATIZADAS"),
    rooms_accessible:    row.count("QT_SALAS_UTILIZADAS_ACESSIVEIS"),
    dvd_players:         row.count("QT_EQUIP_DVD"),
    sound_systems:       row.count("QT_EQUIP_SOM"),
    televisions:         row.count("QT_EQUIP_TV"),
    digital_whiteboards: row.count("QT_EQUIP_LOUSA_DIGITAL"),
    projectors:          row.count("QT_EQUIP_MULTIMIDIA"),
    desktops:            row.count("QT_DESKTOP_ALUNO"),
    laptops:             row.count("QT_COMP_PORTATIL_ALUNO"),
    tablets:             row.count("QT_TABLET_ALUNO"),
    accessibility:       accessibility(row),
    internet:            internet(row),
    staffing:            staffing(row),
  }
}

pub fn quotas(row: &CensusRow) -> Quotas {
  Quotas {
    ppi:           row.flag("N_RESERVA_PPI"),
    income:        row.flag("IN_RESERVA_RENDA"),
    public_school: row.flag("IN_RESERVA_PUBLICA"),
    disability:    row.flag("IN_RESERVA_PCD"),
    other:         row.flag("IN_RESERVA_OUTROS"),
  }
}

/// Enrollments from `QT_MAT_<suffix>`, teachers from `QT_DOC_<suffix>`.
fn stage(row: &CensusRow, suffix: &str) -> StageCounts {
  StageCounts {
    enrollments: row.count(&format!("QT_MAT_{suffix}")),
    teachers:    row.count(&format!("QT_DOC_{suffix}")),
  }
}

pub fn education(row: &CensusRow) -> Education {
  Education {
    indigenous:             row.flag("IN_EDUCACAO_INDIGENA"),
    selection_exam:         row.flag("IN_EXAME_SELECAO"),
    student_union:          row.flag("IN_ORGAO_GREMIO_ESTUDANTIL"),
    distance_learning:      row.flag("IN_EAD"),
    early_childhood:        stage(row, "INF"),
    daycare:                stage(row, "INF_CRE"),
    preschool:              stage(row, "INF_PRE"),
    elementary:             stage(row, "FUND"),
    elementary_early:       stage(row, "FUND_AI"),
    elementary_late:        stage(row, "FUND_AF"),
    high_school:            stage(row, "MED"),
    technical_high_school:  stage(row, "MED_CT"),
    vocational:             stage(row, "PROF"),
    technical:              stage(row, "PROF_TEC"),
    adult:                  stage(row, "EJA"),
    adult_elementary:       stage(row, "EJA_FUND"),
    adult_elementary_early: stage(row, "EJA_FUND_AI"),
    adult_elementary_late:  stage(row, "EJA_FUND_AF"),
    adult_high_school:      stage(row, "EJA_MED"),
    special:                stage(row, "ESP"),
    quotas:                 quotas(row),
  }
}

// ─── Census assembly ─────────────────────────────────────────────────────────

/// What one file contributed to the census tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembledCensus {
  pub records:    usize,
  pub details:    usize,
  /// `(school, year)` pairs already on record, left untouched.
  pub duplicates: usize,
}

pub struct Assembler<'s, S> {
  store:      &'s S,
  chunk_size: usize,
}

impl<'s, S: CensusStore> Assembler<'s, S> {
  pub fn new(store: &'s S, chunk_size: usize) -> Self {
    Self { store, chunk_size: chunk_size.max(1) }
  }

  /// Create the census records of `year` for every cached school in `rows`,
  /// then their details.
  pub async fn assemble(
    &self,
    caches: &mut Caches,
    rows: &[CensusRow],
    year: i32,
  ) -> Result<AssembledCensus> {
    let mut outcome = AssembledCensus::default();

    // Rows arrive one per school from the resolver; keep the first anyway.
    let mut by_school: Vec<(i64, &CensusRow)> = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
      let Some(school) = caches.schools.get(&row.ibge_code) else { continue };
      if seen.insert(school.school_id) {
        by_school.push((school.school_id, row));
      }
    }
    if by_school.is_empty() {
      return Ok(outcome);
    }

    let candidates: Vec<CensusKey> = by_school
      .iter()
      .map(|(school_id, _)| CensusKey { school_id: *school_id, year })
      .collect();

    let mut existing = HashSet::new();
    for chunk in candidates.chunks(self.chunk_size) {
      let found = self
        .store
        .census_exists(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
      existing.extend(found.into_iter().map(|key| key.school_id));
    }
    if !existing.is_empty() {
      warn!(
        year,
        duplicates = existing.len(),
        "census already on record for some schools; skipping them"
      );
    }
    outcome.duplicates = existing.len();
    by_school.retain(|(id, _)| !existing.contains(id));

    let keys: Vec<CensusKey> = by_school
      .iter()
      .map(|(school_id, _)| CensusKey { school_id: *school_id, year })
      .collect();
    for chunk in keys.chunks(self.chunk_size) {
      outcome.records += self
        .store
        .insert_census_records(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
    }

    let mut census_ids = HashMap::new();
    for chunk in keys.chunks(self.chunk_size) {
      let ids = chunk.iter().map(|k| k.school_id).collect();
      let records = self
        .store
        .fetch_census_records(ids, year)
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
      census_ids.extend(records.into_iter().map(|r| (r.school_id, r.census_id)));
    }

    let details: Vec<CensusDetails> = by_school
      .iter()
      .filter_map(|(school_id, row)| {
        let census_id = *census_ids.get(school_id)?;
        Some(CensusDetails {
          census_id,
          infrastructure: infrastructure(row),
          education: education(row),
        })
      })
      .collect();

    for chunk in details.chunks(self.chunk_size) {
      outcome.details += self
        .store
        .insert_census_details(chunk.to_vec())
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
    }

    for school_id in census_ids.keys() {
      caches.record_year(*school_id, year);
    }

    info!(
      year,
      records = outcome.records,
      details = outcome.details,
      duplicates = outcome.duplicates,
      "census assembled"
    );
    Ok(outcome)
  }
}
