//! Fact rows — the grain-level measures of the warehouse.
//!
//! Facts reference dimensions by surrogate key, resolved as of the end of
//! the business date. Rows are grouped into monthly partitions by business
//! date and a load replaces whole partitions, so a fact row is immutable
//! once written and carries no update bookkeeping of its own.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  calendar::YearMonth,
  grading::{GradeLetter, PerformanceBand},
  normalize::{AttendanceStatus, EnrollmentStatus},
};

/// Common shape of fact rows: the business date that assigns the row to a
/// monthly partition.
pub trait FactRow {
  fn date_key(&self) -> NaiveDate;

  fn partition(&self) -> YearMonth {
    YearMonth::from_date(self.date_key())
  }
}

// ─── fct_enrollments ─────────────────────────────────────────────────────────

/// One enrollment event.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentFactRow {
  pub surrogate_key:  String,
  pub enrollment_id:  String,
  pub student_sk:     String,
  pub school_sk:      String,
  pub geography_sk:   String,
  pub date_key:       NaiveDate,
  pub academic_year:  String,
  pub grade_level:    String,
  pub section:        Option<String>,
  pub status:         EnrollmentStatus,
  pub is_active:      bool,
  pub is_dropout:     bool,
  pub dropout_reason: Option<String>,
  pub updated_at:     DateTime<Utc>,
}

impl FactRow for EnrollmentFactRow {
  fn date_key(&self) -> NaiveDate {
    self.date_key
  }
}

// ─── fct_attendances ─────────────────────────────────────────────────────────

/// One student-day attendance mark.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceFactRow {
  pub surrogate_key:      String,
  pub attendance_id:      String,
  pub student_sk:         String,
  pub school_sk:          String,
  pub geography_sk:       String,
  pub date_key:           NaiveDate,
  pub academic_year:      String,
  pub status:             AttendanceStatus,
  pub is_present:         bool,
  /// Whether the day belongs in attendance-rate denominators; holidays and
  /// unknown statuses do not.
  pub counts_toward_rate: bool,
  pub period:             Option<i64>,
  pub updated_at:         DateTime<Utc>,
}

impl FactRow for AttendanceFactRow {
  fn date_key(&self) -> NaiveDate {
    self.date_key
  }
}

// ─── fct_assessment_results ──────────────────────────────────────────────────

/// One graded assessment result with its derived score measures.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentFactRow {
  pub surrogate_key:    String,
  pub result_id:        String,
  pub student_sk:       String,
  pub school_sk:        String,
  pub teacher_sk:       Option<String>,
  pub geography_sk:     String,
  pub date_key:         NaiveDate,
  pub academic_year:    String,
  pub term:             Option<String>,
  pub subject:          String,
  pub assessment_type:  Option<String>,
  pub grade_level:      Option<String>,
  pub marks_obtained:   f64,
  pub max_marks:        f64,
  pub percentage:       f64,
  pub normalized_score: f64,
  pub grade_letter:     GradeLetter,
  pub is_pass:          bool,
  pub performance_band: PerformanceBand,
  pub updated_at:       DateTime<Utc>,
}

impl FactRow for AssessmentFactRow {
  fn date_key(&self) -> NaiveDate {
    self.date_key
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn partition_follows_the_business_date() {
    let row = AttendanceFactRow {
      surrogate_key:      "sk".into(),
      attendance_id:      "ATT-1".into(),
      student_sk:         "s".into(),
      school_sk:          "c".into(),
      geography_sk:       "g".into(),
      date_key:           NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
      academic_year:      "2024".into(),
      status:             AttendanceStatus::Present,
      is_present:         true,
      counts_toward_rate: true,
      period:             None,
      updated_at:         Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
    };
    assert_eq!(row.partition().label(), "2024-03");
  }
}
