//! Harmonisation of raw source values into conformed dimension attributes.
//!
//! Source systems disagree on codes: one school reports gender as `M`/`F`,
//! another as `1`/`2`, a third spells the words out. Every mapping here folds
//! those spellings into a single conformed vocabulary. Values outside the
//! expected domain map to the `Unknown`/`Other` member rather than failing
//! the row; callers decide whether to record a data-quality warning.

use chrono::NaiveDate;

// ─── Text cleaning ───────────────────────────────────────────────────────────

/// Collapse whitespace and Title Case a free-text attribute.
/// Returns `None` when nothing printable remains.
pub fn clean_text(raw: &str) -> Option<String> {
  let collapsed: Vec<&str> = raw.split_whitespace().collect();
  if collapsed.is_empty() {
    return None;
  }
  let words: Vec<String> = collapsed.iter().map(|w| title_case(w)).collect();
  Some(words.join(" "))
}

fn title_case(word: &str) -> String {
  let mut chars = word.chars();
  match chars.next() {
    None => String::new(),
    Some(first) => {
      let mut out: String = first.to_uppercase().collect();
      out.extend(chars.flat_map(char::to_lowercase));
      out
    }
  }
}

/// Canonical form of an identifier: trimmed and upper-cased.
/// Returns `None` for blank input, which callers treat as a missing key.
pub fn clean_key(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  Some(trimmed.to_uppercase())
}

// ─── Gender ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
  Male,
  Female,
  Other,
  Unknown,
}

impl Gender {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_uppercase().as_str() {
      "M" | "MALE" | "1" => Some(Self::Male),
      "F" | "FEMALE" | "2" => Some(Self::Female),
      "O" | "OTHER" | "3" => Some(Self::Other),
      "UNKNOWN" => Some(Self::Unknown),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Male => "Male",
      Self::Female => "Female",
      Self::Other => "Other",
      Self::Unknown => "Unknown",
    }
  }
}

// ─── School type ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchoolType {
  Government,
  Private,
  Ngo,
  Madrasa,
  Technical,
  Other,
}

impl SchoolType {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_uppercase().as_str() {
      "GOVT" | "GOVERNMENT" | "PUBLIC" => Some(Self::Government),
      "PVT" | "PRIVATE" => Some(Self::Private),
      "NGO" => Some(Self::Ngo),
      "MADRASA" | "MADRASAH" => Some(Self::Madrasa),
      "TECHNICAL" | "VOCATIONAL" => Some(Self::Technical),
      "OTHER" => Some(Self::Other),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Government => "Government",
      Self::Private => "Private",
      Self::Ngo => "NGO",
      Self::Madrasa => "Madrasa",
      Self::Technical => "Technical",
      Self::Other => "Other",
    }
  }
}

// ─── Education level ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EducationLevel {
  Primary,
  Secondary,
  HigherSecondary,
  Technical,
  Madrasa,
  Other,
}

impl EducationLevel {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_uppercase().replace('_', " ").as_str() {
      "PRIMARY" => Some(Self::Primary),
      "SECONDARY" => Some(Self::Secondary),
      "HIGHER SECONDARY" | "HIGHER-SECONDARY" | "COLLEGE" => {
        Some(Self::HigherSecondary)
      }
      "TECHNICAL" | "VOCATIONAL" => Some(Self::Technical),
      "MADRASA" | "MADRASAH" => Some(Self::Madrasa),
      "OTHER" => Some(Self::Other),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Primary => "Primary",
      Self::Secondary => "Secondary",
      Self::HigherSecondary => "Higher Secondary",
      Self::Technical => "Technical",
      Self::Madrasa => "Madrasa",
      Self::Other => "Other",
    }
  }
}

// ─── Enrollment status ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollmentStatus {
  Active,
  Inactive,
  Completed,
  Transferred,
  Dropped,
  Suspended,
  Unknown,
}

impl EnrollmentStatus {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "active" | "enrolled" | "current" => Some(Self::Active),
      "inactive" => Some(Self::Inactive),
      "completed" | "graduated" | "passed" => Some(Self::Completed),
      "transferred" | "transfer" => Some(Self::Transferred),
      "dropped" | "dropout" | "dropped_out" | "dropped out" => {
        Some(Self::Dropped)
      }
      "suspended" => Some(Self::Suspended),
      "unknown" => Some(Self::Unknown),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Inactive => "inactive",
      Self::Completed => "completed",
      Self::Transferred => "transferred",
      Self::Dropped => "dropped",
      Self::Suspended => "suspended",
      Self::Unknown => "unknown",
    }
  }

  pub fn is_active(self) -> bool {
    matches!(self, Self::Active)
  }

  pub fn is_dropout(self) -> bool {
    matches!(self, Self::Dropped)
  }
}

// ─── Attendance status ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
  Present,
  Absent,
  Late,
  Excused,
  Sick,
  Holiday,
  Unknown,
}

impl AttendanceStatus {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "present" | "p" | "1" => Some(Self::Present),
      "absent" | "a" | "0" => Some(Self::Absent),
      "late" | "l" | "tardy" => Some(Self::Late),
      "excused" | "e" | "leave" => Some(Self::Excused),
      "sick" | "s" | "ill" => Some(Self::Sick),
      "holiday" | "h" => Some(Self::Holiday),
      "unknown" => Some(Self::Unknown),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Present => "present",
      Self::Absent => "absent",
      Self::Late => "late",
      Self::Excused => "excused",
      Self::Sick => "sick",
      Self::Holiday => "holiday",
      Self::Unknown => "unknown",
    }
  }

  /// Present and late both count as attended.
  pub fn counts_as_present(self) -> bool {
    matches!(self, Self::Present | Self::Late)
  }

  /// Holidays are excluded from attendance-rate denominators; an unknown
  /// status tells us nothing about the school day either.
  pub fn counts_toward_rate(self) -> bool {
    !matches!(self, Self::Holiday | Self::Unknown)
  }
}

// ─── Socioeconomic tier ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SesTier {
  Low,
  Middle,
  High,
  Unknown,
}

impl SesTier {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "low" | "low_income" | "low income" | "poor" => Some(Self::Low),
      "middle" | "middle_income" | "middle income" | "medium" => {
        Some(Self::Middle)
      }
      "high" | "high_income" | "high income" | "affluent" => Some(Self::High),
      "unknown" => Some(Self::Unknown),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "Low",
      Self::Middle => "Middle",
      Self::High => "High",
      Self::Unknown => "Unknown",
    }
  }
}

// ─── Disability ──────────────────────────────────────────────────────────────

/// Fold the free-text disability field into a tri-state flag.
/// `None` means the source did not say either way.
pub fn disability_flag(raw: &str) -> Option<bool> {
  let folded = raw.trim().to_lowercase();
  match folded.as_str() {
    "" | "unknown" | "unspecified" | "n/a" | "na" => None,
    "none" | "no" | "n" | "false" | "0" => Some(false),
    _ => Some(true),
  }
}

// ─── Geography ───────────────────────────────────────────────────────────────

/// District headquarters classified as urban; everything else is rural.
pub const URBAN_DISTRICTS: [&str; 7] = [
  "Dhaka",
  "Chittagong",
  "Sylhet",
  "Rajshahi",
  "Khulna",
  "Barisal",
  "Rangpur",
];

/// Whether a conformed district name counts as urban.
pub fn is_urban_district(district: &str) -> bool {
  URBAN_DISTRICTS.iter().any(|d| *d == district)
}

// ─── Age ─────────────────────────────────────────────────────────────────────

/// Whole years between `date_of_birth` and `as_of`, or `None` when the birth
/// date lies in the future.
pub fn age_years(date_of_birth: NaiveDate, as_of: NaiveDate) -> Option<i64> {
  let days = (as_of - date_of_birth).num_days();
  if days < 0 {
    return None;
  }
  Some(days / 365)
}

/// Five-year age band used by enrolment reporting.
pub fn age_group(date_of_birth: NaiveDate, as_of: NaiveDate) -> Option<&'static str> {
  match age_years(date_of_birth, as_of)? {
    0..=4 => Some("0-4"),
    5..=9 => Some("5-9"),
    10..=14 => Some("10-14"),
    15..=19 => Some("15-19"),
    20..=24 => Some("20-24"),
    _ => Some("25+"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn cleans_free_text_to_title_case() {
    assert_eq!(clean_text("  rahim   uddin "), Some("Rahim Uddin".into()));
    assert_eq!(clean_text("DHAKA"), Some("Dhaka".into()));
    assert_eq!(clean_text("st. gregory's"), Some("St. Gregory's".into()));
    assert_eq!(clean_text("   "), None);
  }

  #[test]
  fn cleans_keys_to_upper_case() {
    assert_eq!(clean_key("  stu-001 "), Some("STU-001".into()));
    assert_eq!(clean_key(""), None);
    assert_eq!(clean_key(" \t "), None);
  }

  #[test]
  fn folds_gender_spellings() {
    for raw in ["M", "m", "male", "MALE", "1", " Male "] {
      assert_eq!(Gender::parse(raw), Some(Gender::Male), "raw = {raw:?}");
    }
    for raw in ["F", "female", "2"] {
      assert_eq!(Gender::parse(raw), Some(Gender::Female));
    }
    assert_eq!(Gender::parse("3"), Some(Gender::Other));
    assert_eq!(Gender::parse("X"), None);
    assert_eq!(Gender::parse(""), None);
  }

  #[test]
  fn folds_school_types() {
    assert_eq!(SchoolType::parse("GOVT"), Some(SchoolType::Government));
    assert_eq!(SchoolType::parse("pvt"), Some(SchoolType::Private));
    assert_eq!(SchoolType::parse("madrasah"), Some(SchoolType::Madrasa));
    assert_eq!(SchoolType::parse("charter"), None);
  }

  #[test]
  fn folds_enrollment_statuses() {
    assert_eq!(
      EnrollmentStatus::parse("Enrolled"),
      Some(EnrollmentStatus::Active)
    );
    assert_eq!(
      EnrollmentStatus::parse("dropped out"),
      Some(EnrollmentStatus::Dropped)
    );
    assert!(EnrollmentStatus::parse("???").is_none());
    assert!(EnrollmentStatus::Dropped.is_dropout());
    assert!(!EnrollmentStatus::Completed.is_dropout());
  }

  #[test]
  fn attendance_present_late_and_denominators() {
    assert!(AttendanceStatus::Present.counts_as_present());
    assert!(AttendanceStatus::Late.counts_as_present());
    assert!(!AttendanceStatus::Absent.counts_as_present());
    assert!(!AttendanceStatus::Holiday.counts_toward_rate());
    assert!(!AttendanceStatus::Unknown.counts_toward_rate());
    assert!(AttendanceStatus::Sick.counts_toward_rate());
  }

  #[test]
  fn folds_socioeconomic_tiers() {
    assert_eq!(SesTier::parse("LOW_INCOME"), Some(SesTier::Low));
    assert_eq!(SesTier::parse("medium"), Some(SesTier::Middle));
    assert_eq!(SesTier::parse("affluent"), Some(SesTier::High));
    assert_eq!(SesTier::parse("middle-ish"), None);
  }

  #[test]
  fn disability_field_is_tri_state() {
    assert_eq!(disability_flag("none"), Some(false));
    assert_eq!(disability_flag("No"), Some(false));
    assert_eq!(disability_flag("visual impairment"), Some(true));
    assert_eq!(disability_flag("yes"), Some(true));
    assert_eq!(disability_flag(""), None);
    assert_eq!(disability_flag("unknown"), None);
  }

  #[test]
  fn urban_classification_uses_district_list() {
    assert!(is_urban_district("Dhaka"));
    assert!(is_urban_district("Rangpur"));
    assert!(!is_urban_district("Bogra"));
    // Matching happens on conformed names only.
    assert!(!is_urban_district("DHAKA"));
  }

  #[test]
  fn age_groups_are_five_year_bands() {
    let as_of = d(2024, 6, 1);
    assert_eq!(age_group(d(2021, 1, 1), as_of), Some("0-4"));
    assert_eq!(age_group(d(2015, 1, 1), as_of), Some("5-9"));
    assert_eq!(age_group(d(2010, 6, 15), as_of), Some("10-14"));
    assert_eq!(age_group(d(2007, 1, 1), as_of), Some("15-19"));
    assert_eq!(age_group(d(2001, 1, 1), as_of), Some("20-24"));
    assert_eq!(age_group(d(1990, 1, 1), as_of), Some("25+"));
    assert_eq!(age_group(d(2030, 1, 1), as_of), None);
  }
}
