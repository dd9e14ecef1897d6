//! Conformed dimension rows.
//!
//! Student, teacher, and school dimensions are slowly changing: every
//! upstream change with a distinct attribute hash becomes a new immutable
//! version row, and the validity interval plus the current flag are computed
//! at read time from the version chain. A version is effective over
//! `[effective_from, effective_to)`; the open end of the latest version is
//! the far-future sentinel rather than a NULL.
//!
//! Geography and time are plain lookup dimensions with no versioning.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::{
  calendar::{self, LoadWindow, Term},
  keys,
  normalize::{self, EducationLevel, Gender, SchoolType, SesTier},
};

/// The open end of a current version's validity interval.
pub fn far_future() -> DateTime<Utc> {
  Utc
    .with_ymd_and_hms(9999, 12, 31, 0, 0, 0)
    .single()
    .expect("sentinel instant is valid")
}

/// Common shape of versioned dimension rows, as needed by point-in-time
/// resolution: a business key and the instant the version took effect.
pub trait DimVersion {
  fn business_key(&self) -> &str;
  fn effective_from(&self) -> DateTime<Utc>;
}

// ─── dim_students ────────────────────────────────────────────────────────────

/// One version of a student.
///
/// `effective_to` and `is_current` are derived from the version chain when
/// rows are read back; values supplied on write are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct DimStudentRow {
  pub surrogate_key:       String,
  pub student_id:          String,
  pub full_name:           String,
  pub gender:              Gender,
  pub date_of_birth:       Option<NaiveDate>,
  pub division:            String,
  pub district:            String,
  pub upazila:             String,
  pub socioeconomic_tier:  SesTier,
  pub has_disability:      Option<bool>,
  pub guardian_contact:    Option<String>,
  /// Age band at the date this version took effect; not part of the
  /// attribute hash since it is derived, not sourced.
  pub age_group:           Option<String>,
  pub attr_hash:           String,
  pub effective_from:      DateTime<Utc>,
  pub effective_to:        DateTime<Utc>,
  pub is_current:          bool,
}

impl DimVersion for DimStudentRow {
  fn business_key(&self) -> &str {
    &self.student_id
  }

  fn effective_from(&self) -> DateTime<Utc> {
    self.effective_from
  }
}

// ─── dim_teachers ────────────────────────────────────────────────────────────

/// One version of a teacher.
#[derive(Debug, Clone, PartialEq)]
pub struct DimTeacherRow {
  pub surrogate_key:      String,
  pub teacher_id:         String,
  pub full_name:          String,
  pub gender:             Gender,
  pub school_id:          Option<String>,
  pub subject_specialty:  Option<String>,
  pub qualification:      Option<String>,
  pub hire_date:          Option<NaiveDate>,
  pub attr_hash:          String,
  pub effective_from:     DateTime<Utc>,
  pub effective_to:       DateTime<Utc>,
  pub is_current:         bool,
}

impl DimVersion for DimTeacherRow {
  fn business_key(&self) -> &str {
    &self.teacher_id
  }

  fn effective_from(&self) -> DateTime<Utc> {
    self.effective_from
  }
}

// ─── dim_schools ─────────────────────────────────────────────────────────────

/// One version of a school.
#[derive(Debug, Clone, PartialEq)]
pub struct DimSchoolRow {
  pub surrogate_key:    String,
  pub school_id:        String,
  pub school_name:      String,
  pub school_type:      SchoolType,
  pub education_level:  EducationLevel,
  pub division:         String,
  pub district:         String,
  pub upazila:          String,
  pub is_rural:         bool,
  pub geo_location:     Option<String>,
  pub attr_hash:        String,
  pub effective_from:   DateTime<Utc>,
  pub effective_to:     DateTime<Utc>,
  pub is_current:       bool,
}

impl DimVersion for DimSchoolRow {
  fn business_key(&self) -> &str {
    &self.school_id
  }

  fn effective_from(&self) -> DateTime<Utc> {
    self.effective_from
  }
}

// ─── dim_geography ───────────────────────────────────────────────────────────

/// A division/district/upazila triple. Unversioned; rows are only ever
/// added, keyed by a digest of the conformed names.
#[derive(Debug, Clone, PartialEq)]
pub struct DimGeographyRow {
  pub surrogate_key: String,
  pub division:      String,
  pub district:      String,
  pub upazila:       String,
  pub is_urban:      bool,
}

impl DimGeographyRow {
  /// Conform raw location fields into a geography row. Blank or missing
  /// levels become `"Unknown"` so the key is always resolvable.
  pub fn conform(
    division: Option<&str>,
    district: Option<&str>,
    upazila: Option<&str>,
  ) -> Self {
    let clean = |raw: Option<&str>| {
      raw
        .and_then(normalize::clean_text)
        .unwrap_or_else(|| "Unknown".to_owned())
    };
    let division = clean(division);
    let district = clean(district);
    let upazila = clean(upazila);
    let surrogate_key = keys::lookup_key(
      keys::tag::DIM_GEOGRAPHY,
      &[&division, &district, &upazila],
    );
    let is_urban = normalize::is_urban_district(&district);
    Self { surrogate_key, division, district, upazila, is_urban }
  }
}

// ─── dim_time ────────────────────────────────────────────────────────────────

/// One calendar day. Generated, never sourced.
#[derive(Debug, Clone, PartialEq)]
pub struct DimTimeRow {
  pub date_key:      NaiveDate,
  pub year:          i32,
  pub month:         u32,
  pub day:           u32,
  pub day_of_week:   String,
  pub academic_year: String,
  pub term:          Term,
  pub is_weekend:    bool,
}

impl DimTimeRow {
  pub fn for_date(date: NaiveDate) -> Self {
    Self {
      date_key:      date,
      year:          date.year(),
      month:         date.month(),
      day:           date.day(),
      day_of_week:   date.format("%A").to_string(),
      academic_year: calendar::academic_year(date),
      term:          Term::for_month(date.month()),
      is_weekend:    calendar::is_weekend(date),
    }
  }

  /// Every day covered by the window, in order.
  pub fn generate(window: &LoadWindow) -> Vec<Self> {
    let mut rows = Vec::new();
    let mut cursor = window.start_date();
    let end = window.end_date();
    while cursor <= end {
      rows.push(Self::for_date(cursor));
      cursor = match cursor.succ_opt() {
        Some(next) => next,
        None => break,
      };
    }
    rows
  }
}

#[cfg(test)]
mod tests {
  use crate::calendar::YearMonth;

  use super::*;

  #[test]
  fn far_future_sentinel() {
    let sentinel = far_future();
    assert_eq!(sentinel.year(), 9999);
    assert_eq!(sentinel.month(), 12);
    assert_eq!(sentinel.day(), 31);
  }

  #[test]
  fn geography_conforms_and_falls_back_to_unknown() {
    let geo = DimGeographyRow::conform(Some(" dhaka "), Some("DHAKA"), None);
    assert_eq!(geo.division, "Dhaka");
    assert_eq!(geo.district, "Dhaka");
    assert_eq!(geo.upazila, "Unknown");
    assert!(geo.is_urban);

    let rural = DimGeographyRow::conform(Some("Rajshahi"), Some("bogra"), Some("sadar"));
    assert!(!rural.is_urban);
  }

  #[test]
  fn geography_key_is_deterministic() {
    let a = DimGeographyRow::conform(Some("Dhaka"), Some("Dhaka"), Some("Savar"));
    let b = DimGeographyRow::conform(Some("  DHAKA"), Some("dhaka"), Some("SAVAR"));
    assert_eq!(a.surrogate_key, b.surrogate_key);
  }

  #[test]
  fn time_rows_cover_the_window() {
    let window = LoadWindow::single(YearMonth::new(2024, 2).unwrap());
    let rows = DimTimeRow::generate(&window);
    assert_eq!(rows.len(), 29);
    assert_eq!(rows[0].date_key, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    assert_eq!(rows[28].date_key, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

    let friday = &rows[1]; // 2024-02-02
    assert_eq!(friday.day_of_week, "Friday");
    assert!(friday.is_weekend);
    assert_eq!(friday.term, Term::First);
    assert_eq!(friday.academic_year, "2024");
  }
}
