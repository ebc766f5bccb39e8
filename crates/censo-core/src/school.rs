//! Schools, the mutable entity of the catalog.
//!
//! A school is created the first time its IBGE code is seen. Afterwards its
//! attributes are only ever overwritten by rows from a strictly later census
//! year (latest-year-wins).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Categorical codes ───────────────────────────────────────────────────────

/// Administrative category of a school (census column `TP_DEPENDENCIA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
  #[default]
  Federal,
  State,
  Municipal,
  Private,
}

impl DependencyType {
  pub fn code(self) -> i64 {
    match self {
      Self::Federal => 1,
      Self::State => 2,
      Self::Municipal => 3,
      Self::Private => 4,
    }
  }

  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      1 => Ok(Self::Federal),
      2 => Ok(Self::State),
      3 => Ok(Self::Municipal),
      4 => Ok(Self::Private),
      other => Err(Error::UnknownDependency(other)),
    }
  }
}

/// Sub-category of a private school (`TP_CATEGORIA_ESCOLA_PRIVADA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivateCategory {
  Particular,
  Community,
  Confessional,
  Philanthropic,
}

impl PrivateCategory {
  pub fn code(self) -> i64 {
    match self {
      Self::Particular => 1,
      Self::Community => 2,
      Self::Confessional => 3,
      Self::Philanthropic => 4,
    }
  }

  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      1 => Ok(Self::Particular),
      2 => Ok(Self::Community),
      3 => Ok(Self::Confessional),
      4 => Ok(Self::Philanthropic),
      other => Err(Error::UnknownPrivateCategory(other)),
    }
  }
}

/// `TP_LOCALIZACAO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
  #[default]
  Urban,
  Rural,
}

impl Location {
  pub fn code(self) -> i64 {
    match self {
      Self::Urban => 1,
      Self::Rural => 2,
    }
  }

  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      1 => Ok(Self::Urban),
      2 => Ok(Self::Rural),
      other => Err(Error::UnknownLocation(other)),
    }
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub street:       String,
  pub number:       String,
  pub complement:   String,
  pub neighborhood: String,
  pub postal_code:  String,
}

/// Everything the census says about a school. Used both to create a new
/// school and as the payload of a latest-year-wins update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolAttributes {
  /// Natural key; never changes once the school exists.
  pub ibge_code:           String,
  pub name:                String,
  pub dependency:          DependencyType,
  /// Present iff `dependency` is [`DependencyType::Private`].
  pub private_category:    Option<PrivateCategory>,
  pub location:            Location,
  pub city_id:             i64,
  pub address:             Address,
  pub area_code:           Option<String>,
  pub phone:               Option<String>,
  pub academic_year_start: Option<NaiveDate>,
  pub academic_year_end:   Option<NaiveDate>,
}

impl SchoolAttributes {
  /// Enforce the private-category invariant.
  pub fn validate(&self) -> Result<()> {
    match (self.dependency, self.private_category) {
      (DependencyType::Private, None) => {
        Err(Error::PrivateCategoryRequired(self.ibge_code.clone()))
      }
      (DependencyType::Private, Some(_)) | (_, None) => Ok(()),
      (_, Some(_)) => Err(Error::PrivateCategoryForbidden(self.ibge_code.clone())),
    }
  }
}

/// A persisted school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
  pub school_id:  i64,
  #[serde(flatten)]
  pub attributes: SchoolAttributes,
}

// ─── Update field list ───────────────────────────────────────────────────────

/// A mutable school attribute. Batched updates name the fields they write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolField {
  Name,
  Dependency,
  PrivateCategory,
  Location,
  City,
  Street,
  Number,
  Complement,
  Neighborhood,
  PostalCode,
  AreaCode,
  Phone,
  AcademicYearStart,
  AcademicYearEnd,
}

impl SchoolField {
  /// Every attribute that a newer census year overwrites.
  pub const ALL: [SchoolField; 14] = [
    Self::Name,
    Self::Dependency,
    Self::PrivateCategory,
    Self::Location,
    Self::City,
    Self::Street,
    Self::Number,
    Self::Complement,
    Self::Neighborhood,
    Self::PostalCode,
    Self::AreaCode,
    Self::Phone,
    Self::AcademicYearStart,
    Self::AcademicYearEnd,
  ];
}

#[cfg(test)]
mod tests {
  use super::*;

  fn attributes(
    dependency: DependencyType,
    private_category: Option<PrivateCategory>,
  ) -> SchoolAttributes {
    SchoolAttributes {
      ibge_code: "35000001".into(),
      name: "EE Teste".into(),
      dependency,
      private_category,
      location: Location::Urban,
      city_id: 1,
      address: Address::default(),
      area_code: None,
      phone: None,
      academic_year_start: None,
      academic_year_end: None,
    }
  }

  #[test]
  fn private_school_requires_category() {
    let err = attributes(DependencyType::Private, None)
      .validate()
      .unwrap_err();
    assert!(matches!(err, Error::PrivateCategoryRequired(code) if code == "35000001"));

    attributes(DependencyType::Private, Some(PrivateCategory::Confessional))
      .validate()
      .unwrap();
  }

  #[test]
  fn public_school_forbids_category() {
    let err = attributes(DependencyType::Municipal, Some(PrivateCategory::Particular))
      .validate()
      .unwrap_err();
    assert!(matches!(err, Error::PrivateCategoryForbidden(_)));

    attributes(DependencyType::State, None).validate().unwrap();
  }

  #[test]
  fn codes_roundtrip_and_reject_unknown() {
    for dep in [
      DependencyType::Federal,
      DependencyType::State,
      DependencyType::Municipal,
      DependencyType::Private,
    ] {
      assert_eq!(DependencyType::from_code(dep.code()).unwrap(), dep);
    }
    assert!(matches!(
      DependencyType::from_code(9),
      Err(Error::UnknownDependency(9))
    ));
    assert!(Location::from_code(0).is_err());
    assert_eq!(Location::from_code(2).unwrap(), Location::Rural);
    assert!(PrivateCategory::from_code(5).is_err());
  }
}
