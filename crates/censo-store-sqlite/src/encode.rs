//! Encoding and decoding helpers between Rust domain types and SQLite
//! columns.
//!
//! Flags are stored as `0`/`1` integers, dates as ISO 8601 strings, enum
//! codes as the census integer codes. Each detail aggregate has one
//! `*_columns` function listing `(column, value)` pairs; it drives both the
//! INSERT statements and the generated DDL, and the matching `decode_*`
//! function reads the same names back.

use chrono::NaiveDate;
use censo_core::{
  census::{
    Accessibility, Education, Infrastructure, Internet, Quotas, StageCounts, Staffing,
  },
  place::{City, State},
  school::{
    Address, DependencyType, Location, PrivateCategory, School, SchoolAttributes, SchoolField,
  },
};
use rusqlite::{Row, types::Value};

use crate::{Error, Result};

pub type Columns = Vec<(&'static str, Value)>;

// ─── Scalars ─────────────────────────────────────────────────────────────────

fn flag(b: bool) -> Value { Value::Integer(i64::from(b)) }

fn count(n: u32) -> Value { Value::Integer(i64::from(n)) }

fn text(s: &str) -> Value { Value::Text(s.to_owned()) }

fn opt_text(s: Option<&str>) -> Value {
  s.map_or(Value::Null, |s| Value::Text(s.to_owned()))
}

pub fn encode_date(d: Option<NaiveDate>) -> Value {
  d.map_or(Value::Null, |d| Value::Text(d.format("%Y-%m-%d").to_string()))
}

pub fn decode_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
  s.map(|s| {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
      .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
  })
  .transpose()
}

/// `?, ?, ?` with `n` placeholders.
pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── Schools ─────────────────────────────────────────────────────────────────

/// Column order shared by every school SELECT.
pub const SCHOOL_COLUMNS: &str = "school_id, ibge_code, name, dependency, private_category, \
   location, city_id, street, number, complement, neighborhood, postal_code, area_code, phone, \
   academic_year_start, academic_year_end";

/// The column backing one mutable field, with its value taken from `a`.
pub fn encode_school_field(field: SchoolField, a: &SchoolAttributes) -> (&'static str, Value) {
  match field {
    SchoolField::Name => ("name", text(&a.name)),
    SchoolField::Dependency => ("dependency", Value::Integer(a.dependency.code())),
    SchoolField::PrivateCategory => (
      "private_category",
      a.private_category
        .map_or(Value::Null, |c| Value::Integer(c.code())),
    ),
    SchoolField::Location => ("location", Value::Integer(a.location.code())),
    SchoolField::City => ("city_id", Value::Integer(a.city_id)),
    SchoolField::Street => ("street", text(&a.address.street)),
    SchoolField::Number => ("number", text(&a.address.number)),
    SchoolField::Complement => ("complement", text(&a.address.complement)),
    SchoolField::Neighborhood => ("neighborhood", text(&a.address.neighborhood)),
    SchoolField::PostalCode => ("postal_code", text(&a.address.postal_code)),
    SchoolField::AreaCode => ("area_code", opt_text(a.area_code.as_deref())),
    SchoolField::Phone => ("phone", opt_text(a.phone.as_deref())),
    SchoolField::AcademicYearStart => ("academic_year_start", encode_date(a.academic_year_start)),
    SchoolField::AcademicYearEnd => ("academic_year_end", encode_date(a.academic_year_end)),
  }
}

/// Every column written when a school is first created.
pub fn school_columns(a: &SchoolAttributes) -> Columns {
  let mut columns = vec![("ibge_code", text(&a.ibge_code))];
  columns.extend(
    SchoolField::ALL
      .iter()
      .map(|field| encode_school_field(*field, a)),
  );
  columns
}

/// Raw values read directly from a `schools` row in [`SCHOOL_COLUMNS`] order.
pub struct RawSchool {
  pub school_id:           i64,
  pub ibge_code:           String,
  pub name:                String,
  pub dependency:          i64,
  pub private_category:    Option<i64>,
  pub location:            i64,
  pub city_id:             i64,
  pub street:              String,
  pub number:              String,
  pub complement:          String,
  pub neighborhood:        String,
  pub postal_code:         String,
  pub area_code:           Option<String>,
  pub phone:               Option<String>,
  pub academic_year_start: Option<String>,
  pub academic_year_end:   Option<String>,
}

impl RawSchool {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      school_id:           row.get(0)?,
      ibge_code:           row.get(1)?,
      name:                row.get(2)?,
      dependency:          row.get(3)?,
      private_category:    row.get(4)?,
      location:            row.get(5)?,
      city_id:             row.get(6)?,
      street:              row.get(7)?,
      number:              row.get(8)?,
      complement:          row.get(9)?,
      neighborhood:        row.get(10)?,
      postal_code:         row.get(11)?,
      area_code:           row.get(12)?,
      phone:               row.get(13)?,
      academic_year_start: row.get(14)?,
      academic_year_end:   row.get(15)?,
    })
  }

  pub fn into_school(self) -> Result<School> {
    Ok(School {
      school_id:  self.school_id,
      attributes: SchoolAttributes {
        ibge_code:           self.ibge_code,
        name:                self.name,
        dependency:          DependencyType::from_code(self.dependency)?,
        private_category:    self
          .private_category
          .map(PrivateCategory::from_code)
          .transpose()?,
        location:            Location::from_code(self.location)?,
        city_id:             self.city_id,
        address:             Address {
          street:       self.street,
          number:       self.number,
          complement:   self.complement,
          neighborhood: self.neighborhood,
          postal_code:  self.postal_code,
        },
        area_code:           self.area_code,
        phone:               self.phone,
        academic_year_start: decode_date(self.academic_year_start.as_deref())?,
        academic_year_end:   decode_date(self.academic_year_end.as_deref())?,
      },
    })
  }
}

// ─── Places ──────────────────────────────────────────────────────────────────

pub fn decode_state(row: &Row<'_>) -> rusqlite::Result<State> {
  Ok(State {
    state_id: row.get(0)?,
    code:     row.get(1)?,
    name:     row.get(2)?,
    region:   row.get(3)?,
  })
}

/// Expects `city_id, name, state_id, state_code`.
pub fn decode_city(row: &Row<'_>) -> rusqlite::Result<City> {
  Ok(City {
    city_id:    row.get(0)?,
    name:       row.get(1)?,
    state_id:   row.get(2)?,
    state_code: row.get(3)?,
  })
}

// ─── Accessibility / Internet / Staffing / Quotas ────────────────────────────

pub fn accessibility_columns(a: &Accessibility) -> Columns {
  vec![
    ("handrail", flag(a.handrail)),
    ("elevator", flag(a.elevator)),
    ("tactile_floor", flag(a.tactile_floor)),
    ("clear_span", flag(a.clear_span)),
    ("ramps", flag(a.ramps)),
    ("sound_signal", flag(a.sound_signal)),
    ("tactile_signal", flag(a.tactile_signal)),
    ("visual_signal", flag(a.visual_signal)),
  ]
}

pub fn decode_accessibility(row: &Row<'_>) -> rusqlite::Result<Accessibility> {
  Ok(Accessibility {
    handrail:       row.get("handrail")?,
    elevator:       row.get("elevator")?,
    tactile_floor:  row.get("tactile_floor")?,
    clear_span:     row.get("clear_span")?,
    ramps:          row.get("ramps")?,
    sound_signal:   row.get("sound_signal")?,
    tactile_signal: row.get("tactile_signal")?,
    visual_signal:  row.get("visual_signal")?,
  })
}

pub fn internet_columns(i: &Internet) -> Columns {
  vec![
    ("students", flag(i.students)),
    ("administrative", flag(i.administrative)),
    ("learning", flag(i.learning)),
    ("community", flag(i.community)),
    ("student_computers", flag(i.student_computers)),
    ("personal_devices", flag(i.personal_devices)),
  ]
}

pub fn decode_internet(row: &Row<'_>) -> rusqlite::Result<Internet> {
  Ok(Internet {
    students:          row.get("students")?,
    administrative:    row.get("administrative")?,
    learning:          row.get("learning")?,
    community:         row.get("community")?,
    student_computers: row.get("student_computers")?,
    personal_devices:  row.get("personal_devices")?,
  })
}

pub fn staffing_columns(s: &Staffing) -> Columns {
  vec![
    ("administrative", count(s.administrative)),
    ("general_services", count(s.general_services)),
    ("librarian", count(s.librarian)),
    ("health", count(s.health)),
    ("coordinator", count(s.coordinator)),
    ("speech_therapist", count(s.speech_therapist)),
    ("nutritionist", count(s.nutritionist)),
    ("psychologist", count(s.psychologist)),
    ("food_service", count(s.food_service)),
    ("pedagogy", count(s.pedagogy)),
    ("secretary", count(s.secretary)),
    ("security", count(s.security)),
    ("monitors", count(s.monitors)),
    ("management", count(s.management)),
    ("social_worker", count(s.social_worker)),
  ]
}

pub fn decode_staffing(row: &Row<'_>) -> rusqlite::Result<Staffing> {
  Ok(Staffing {
    administrative:   row.get("administrative")?,
    general_services: row.get("general_services")?,
    librarian:        row.get("librarian")?,
    health:           row.get("health")?,
    coordinator:      row.get("coordinator")?,
    speech_therapist: row.get("speech_therapist")?,
    nutritionist:     row.get("nutritionist")?,
    psychologist:     row.get("psychologist")?,
    food_service:     row.get("food_service")?,
    pedagogy:         row.get("pedagogy")?,
    secretary:        row.get("secretary")?,
    security:         row.get("security")?,
    monitors:         row.get("monitors")?,
    management:       row.get("management")?,
    social_worker:    row.get("social_worker")?,
  })
}

pub fn quotas_columns(q: &Quotas) -> Columns {
  vec![
    ("ppi", flag(q.ppi)),
    ("income", flag(q.income)),
    ("public_school", flag(q.public_school)),
    ("disability", flag(q.disability)),
    ("other", flag(q.other)),
  ]
}

pub fn decode_quotas(row: &Row<'_>) -> rusqlite::Result<Quotas> {
  Ok(Quotas {
    ppi:           row.get("ppi")?,
    income:        row.get("income")?,
    public_school: row.get("public_school")?,
    disability:    row.get("disability")?,
    other:         row.get("other")?,
  })
}

// ─── Infrastructure ──────────────────────────────────────────────────────────

/// Own columns only; the owner and sub-aggregate ids are added on insert.
pub fn infrastructure_columns(i: &Infrastructure) -> Columns {
  vec![
    ("drinking_water", flag(i.drinking_water)),
    ("storeroom", flag(i.storeroom)),
    ("green_area", flag(i.green_area)),
    ("auditorium", flag(i.auditorium)),
    ("bathroom", flag(i.bathroom)),
    ("child_bathroom", flag(i.child_bathroom)),
    ("accessible_bathroom", flag(i.accessible_bathroom)),
    ("staff_bathroom", flag(i.staff_bathroom)),
    ("shower", flag(i.shower)),
    ("library", flag(i.library)),
    ("kitchen", flag(i.kitchen)),
    ("student_dormitory", flag(i.student_dormitory)),
    ("teacher_dormitory", flag(i.teacher_dormitory)),
    ("science_lab", flag(i.science_lab)),
    ("computer_lab", flag(i.computer_lab)),
    ("covered_patio", flag(i.covered_patio)),
    ("open_patio", flag(i.open_patio)),
    ("playground", flag(i.playground)),
    ("pool", flag(i.pool)),
    ("covered_court", flag(i.covered_court)),
    ("open_court", flag(i.open_court)),
    ("arts_room", flag(i.arts_room)),
    ("music_room", flag(i.music_room)),
    ("dance_studio", flag(i.dance_studio)),
    ("multipurpose_room", flag(i.multipurpose_room)),
    ("principal_office", flag(i.principal_office)),
    ("reading_room", flag(i.reading_room)),
    ("teachers_room", flag(i.teachers_room)),
    ("student_rest_room", flag(i.student_rest_room)),
    ("secretariat", flag(i.secretariat)),
    ("special_care_room", flag(i.special_care_room)),
    ("recreation_yard", flag(i.recreation_yard)),
    ("food_service", flag(i.food_service)),
    ("social_media", flag(i.social_media)),
    ("rooms", count(i.rooms)),
    ("rooms_outside", count(i.rooms_outside)),
    ("rooms_inside", count(i.rooms_inside)),
    ("rooms_climatized", count(i.rooms_climatized)),
    ("rooms_accessible", count(i.rooms_accessible)),
    ("dvd_players", count(i.dvd_players)),
    ("sound_systems", count(i.sound_systems)),
    ("televisions", count(i.televisions)),
    ("digital_whiteboards", count(i.digital_whiteboards)),
    ("projectors", count(i.projectors)),
    ("desktops", count(i.desktops)),
    ("laptops", count(i.laptops)),
    ("tablets", count(i.tablets)),
  ]
}

/// Decode the infrastructure row itself. Sub-aggregates are left at their
/// defaults; the caller fills them from their own tables.
pub fn decode_infrastructure(row: &Row<'_>) -> rusqlite::Result<Infrastructure> {
  Ok(Infrastructure {
    drinking_water:      row.get("drinking_water")?,
    storeroom:           row.get("storeroom")?,
    green_area:          row.get("green_area")?,
    auditorium:          row.get("auditorium")?,
    bathroom:            row.get("bathroom")?,
    child_bathroom:      row.get("child_bathroom")?,
    accessible_bathroom: row.get("accessible_bathroom")?,
    staff_bathroom:      row.get("staff_bathroom")?,
    shower:              row.get("shower")?,
    library:             row.get("library")?,
    kitchen:             row.get("kitchen")?,
    student_dormitory:   row.get("student_dormitory")?,
    teacher_dormitory:   row.get("teacher_dormitory")?,
    science_lab:         row.get("science_lab")?,
    computer_lab:        row.get("computer_lab")?,
    covered_patio:       row.get("covered_patio")?,
    open_patio:          row.get("open_patio")?,
    playground:          row.get("playground")?,
    pool:                row.get("pool")?,
    covered_court:       row.get("covered_court")?,
    open_court:          row.get("open_court")?,
    arts_room:           row.get("arts_room")?,
    music_room:          row.get("music_room")?,
    dance_studio:        row.get("dance_studio")?,
    multipurpose_room:   row.get("multipurpose_room")?,
    principal_office:    row.get("principal_office")?,
    reading_room:        row.get("reading_room")?,
    teachers_room:       row.get("teachers_room")?,
    student_rest_room:   row.get("student_rest_room")?,
    secretariat:         row.get("secretariat")?,
    special_care_room:   row.get("special_care_room")?,
    recreation_yard:     row.get("recreation_yard")?,
    food_service:        row.get("food_service")?,
    social_media:        row.get("social_media")?,
    rooms:               row.get("rooms")?,
    rooms_outside:       row.get("rooms_outside")?,
    rooms_inside:        row.get("rooms_inside")?,
    rooms_climatized:    row.get("rooms_climatized")?,
    rooms_accessible:    row.get("rooms_accessible")?,
    dvd_players:         row.get("dvd_players")?,
    sound_systems:       row.get("sound_systems")?,
    televisions:         row.get("televisions")?,
    digital_whiteboards: row.get("digital_whiteboards")?,
    projectors:          row.get("projectors")?,
    desktops:            row.get("desktops")?,
    laptops:             row.get("laptops")?,
    tablets:             row.get("tablets")?,
    accessibility:       Accessibility::default(),
    internet:            Internet::default(),
    staffing:            Staffing::default(),
  })
}

// ─── Education ───────────────────────────────────────────────────────────────

pub fn education_columns(e: &Education) -> Columns {
  vec![
    ("indigenous", flag(e.indigenous)),
    ("selection_exam", flag(e.selection_exam)),
    ("student_union", flag(e.student_union)),
    ("distance_learning", flag(e.distance_learning)),
    ("early_childhood_enrollments", count(e.early_childhood.enrollments)),
    ("early_childhood_teachers", count(e.early_childhood.teachers)),
    ("daycare_enrollments", count(e.daycare.enrollments)),
    ("daycare_teachers", count(e.daycare.teachers)),
    ("preschool_enrollments", count(e.preschool.enrollments)),
    ("preschool_teachers", count(e.preschool.teachers)),
    ("elementary_enrollments", count(e.elementary.enrollments)),
    ("elementary_teachers", count(e.elementary.teachers)),
    ("elementary_early_enrollments", count(e.elementary_early.enrollments)),
    ("elementary_early_teachers", count(e.elementary_early.teachers)),
    ("elementary_late_enrollments", count(e.elementary_late.enrollments)),
    ("elementary_late_teachers", count(e.elementary_late.teachers)),
    ("high_school_enrollments", count(e.high_school.enrollments)),
    ("high_school_teachers", count(e.high_school.teachers)),
    ("technical_high_school_enrollments", count(e.technical_high_school.enrollments)),
    ("technical_high_school_teachers", count(e.technical_high_school.teachers)),
    ("vocational_enrollments", count(e.vocational.enrollments)),
    ("vocational_teachers", count(e.vocational.teachers)),
    ("technical_enrollments", count(e.technical.enrollments)),
    ("technical_teachers", count(e.technical.teachers)),
    ("adult_enrollments", count(e.adult.enrollments)),
    ("adult_teachers", count(e.adult.teachers)),
    ("adult_elementary_enrollments", count(e.adult_elementary.enrollments)),
    ("adult_elementary_teachers", count(e.adult_elementary.teachers)),
    ("adult_elementary_early_enrollments", count(e.adult_elementary_early.enrollments)),
    ("adult_elementary_early_teachers", count(e.adult_elementary_early.teachers)),
    ("adult_elementary_late_enrollments", count(e.adult_elementary_late.enrollments)),
    ("adult_elementary_late_teachers", count(e.adult_elementary_late.teachers)),
    ("adult_high_school_enrollments", count(e.adult_high_school.enrollments)),
    ("adult_high_school_teachers", count(e.adult_high_school.teachers)),
    ("special_enrollments", count(e.special.enrollments)),
    ("special_teachers", count(e.special.teachers)),
  ]
}

fn stage(row: &Row<'_>, enrollments: &str, teachers: &str) -> rusqlite::Result<StageCounts> {
  Ok(StageCounts {
    enrollments: row.get(enrollments)?,
    teachers:    row.get(teachers)?,
  })
}

/// Decode the education row itself; `quotas` is filled by the caller.
pub fn decode_education(row: &Row<'_>) -> rusqlite::Result<Education> {
  Ok(Education {
    indigenous:             row.get("indigenous")?,
    selection_exam:         row.get("selection_exam")?,
    student_union:          row.get("student_union")?,
    distance_learning:      row.get("distance_learning")?,
    early_childhood:        stage(row, "early_childhood_enrollments", "early_childhood_teachers")?,
    daycare:                stage(row, "daycare_enrollments", "daycare_teachers")?,
    preschool:              stage(row, "preschool_enrollments", "preschool_teachers")?,
    elementary:             stage(row, "elementary_enrollments", "elementary_teachers")?,
    elementary_early:       stage(row, "elementary_early_enrollments", "elementary_early_teachers")?,
    elementary_late:        stage(row, "elementary_late_enrollments", "elementary_late_teachers")?,
    high_school:            stage(row, "high_school_enrollments", "high_school_teachers")?,
    technical_high_school:  stage(
      row,
      "technical_high_school_enrollments",
      "technical_high_school_teachers",
    )?,
    vocational:             stage(row, "vocational_enrollments", "vocational_teachers")?,
    technical:              stage(row, "technical_enrollments", "technical_teachers")?,
    adult:                  stage(row, "adult_enrollments", "adult_teachers")?,
    adult_elementary:       stage(row, "adult_elementary_enrollments", "adult_elementary_teachers")?,
    adult_elementary_early: stage(
      row,
      "adult_elementary_early_enrollments",
      "adult_elementary_early_teachers",
    )?,
    adult_elementary_late:  stage(
      row,
      "adult_elementary_late_enrollments",
      "adult_elementary_late_teachers",
    )?,
    adult_high_school:      stage(row, "adult_high_school_enrollments", "adult_high_school_teachers")?,
    special:                stage(row, "special_enrollments", "special_teachers")?,
    quotas:                 Quotas::default(),
  })
}
