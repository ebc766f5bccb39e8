//! Census records and their detail aggregates.
//!
//! A [`CensusRecord`] is one school's submission for one year. It is created
//! exactly once per `(school, year)` and never updated. Its details are
//! written together as one [`CensusDetails`] composite that already holds
//! every sub-aggregate.

use serde::{Deserialize, Serialize};

// ─── Census record ───────────────────────────────────────────────────────────

/// Natural key of a census record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CensusKey {
  pub school_id: i64,
  pub year:      i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusRecord {
  pub census_id: i64,
  pub school_id: i64,
  pub year:      i32,
}

impl CensusRecord {
  pub fn key(&self) -> CensusKey {
    CensusKey { school_id: self.school_id, year: self.year }
  }
}

// ─── Infrastructure sub-aggregates ───────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessibility {
  pub handrail:       bool,
  pub elevator:       bool,
  pub tactile_floor:  bool,
  pub clear_span:     bool,
  pub ramps:          bool,
  pub sound_signal:   bool,
  pub tactile_signal: bool,
  pub visual_signal:  bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internet {
  pub students:          bool,
  pub administrative:    bool,
  pub learning:          bool,
  pub community:         bool,
  /// Students reach the internet through school computers.
  pub student_computers: bool,
  /// Students reach the internet through personal devices.
  pub personal_devices:  bool,
}

/// Staff head-counts by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staffing {
  pub administrative:   u32,
  pub general_services: u32,
  pub librarian:        u32,
  pub health:           u32,
  pub coordinator:      u32,
  pub speech_therapist: u32,
  pub nutritionist:     u32,
  pub psychologist:     u32,
  pub food_service:     u32,
  pub pedagogy:         u32,
  pub secretary:        u32,
  pub security:         u32,
  pub monitors:         u32,
  pub management:       u32,
  pub social_worker:    u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infrastructure {
  // facilities
  pub drinking_water:      bool,
  pub storeroom:           bool,
  pub green_area:          bool,
  pub auditorium:          bool,
  pub bathroom:            bool,
  pub child_bathroom:      bool,
  pub accessible_bathroom: bool,
  pub staff_bathroom:      bool,
  pub shower:              bool,
  pub library:             bool,
  pub kitchen:             bool,
  pub student_dormitory:   bool,
  pub teacher_dormitory:   bool,
  pub science_lab:         bool,
  pub computer_lab:        bool,
  pub covered_patio:       bool,
  pub open_patio:          bool,
  pub playground:          bool,
  pub pool:                bool,
  pub covered_court:       bool,
  pub open_court:          bool,
  pub arts_room:           bool,
  pub music_room:          bool,
  pub dance_studio:        bool,
  pub multipurpose_room:   bool,
  pub principal_office:    bool,
  pub reading_room:        bool,
  pub teachers_room:       bool,
  pub student_rest_room:   bool,
  pub secretariat:         bool,
  pub special_care_room:   bool,
  pub recreation_yard:     bool,
  // services
  pub food_service:        bool,
  pub social_media:        bool,
  // counts
  pub rooms:               u32,
  pub rooms_outside:       u32,
  pub rooms_inside:        u32,
  pub rooms_climatized:    u32,
  pub rooms_accessible:    u32,
  pub dvd_players:         u32,
  pub sound_systems:       u32,
  pub televisions:         u32,
  pub digital_whiteboards: u32,
  pub projectors:          u32,
  pub desktops:            u32,
  pub laptops:             u32,
  pub tablets:             u32,
  // owned sub-aggregates
  pub accessibility:       Accessibility,
  pub internet:            Internet,
  pub staffing:            Staffing,
}

// ─── Education ───────────────────────────────────────────────────────────────

/// Reserved-seat policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
  /// Black, brown and indigenous students.
  pub ppi:           bool,
  pub income:        bool,
  pub public_school: bool,
  pub disability:    bool,
  pub other:         bool,
}

/// Enrollment and teacher counts for one education stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
  pub enrollments: u32,
  pub teachers:    u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
  pub indigenous:             bool,
  pub selection_exam:         bool,
  pub student_union:          bool,
  pub distance_learning:      bool,
  pub early_childhood:        StageCounts,
  pub daycare:                StageCounts,
  pub preschool:              StageCounts,
  pub elementary:             StageCounts,
  pub elementary_early:       StageCounts,
  pub elementary_late:        StageCounts,
  pub high_school:            StageCounts,
  pub technical_high_school:  StageCounts,
  pub vocational:             StageCounts,
  pub technical:              StageCounts,
  pub adult:                  StageCounts,
  pub adult_elementary:       StageCounts,
  pub adult_elementary_early: StageCounts,
  pub adult_elementary_late:  StageCounts,
  pub adult_high_school:      StageCounts,
  pub special:                StageCounts,
  pub quotas:                 Quotas,
}

// ─── Composite ───────────────────────────────────────────────────────────────

/// All details for one census record, persisted as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusDetails {
  pub census_id:      i64,
  pub infrastructure: Infrastructure,
  pub education:      Education,
}

/// An infrastructure record read back from the store, with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureRecord {
  pub infrastructure_id: i64,
  pub census_id:         i64,
  pub infrastructure:    Infrastructure,
}
