//! Source record types — the raw layer's view of upstream extracts.
//!
//! Each type mirrors one upstream entity as it arrives, before any
//! harmonisation. Serde aliases absorb the field spellings of the source
//! systems so one deserialisation path covers every feed. Values are kept
//! verbatim; cleaning happens in the dimension and fact builders.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Common shape of every source record: a business key identifying the
/// entity and the upstream modification instant that versions it.
pub trait SourceRecord {
  fn business_key(&self) -> &str;
  fn updated_at(&self) -> DateTime<Utc>;
}

/// A source record as read back from the raw layer, carrying the insertion
/// sequence the raw table assigned. The sequence breaks ties between rows
/// that share a business key and `updated_at`: the highest one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged<T> {
  pub source_seq: i64,
  pub row:        T,
}

// ─── Dimension-shaped entities ───────────────────────────────────────────────

/// A student as exported by an EMIS feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
  pub student_id:            String,
  #[serde(alias = "name")]
  pub full_name:             String,
  #[serde(default, alias = "sex")]
  pub gender:                Option<String>,
  #[serde(default, alias = "dob")]
  pub date_of_birth:         Option<NaiveDate>,
  #[serde(default)]
  pub division:              Option<String>,
  #[serde(default)]
  pub district:              Option<String>,
  #[serde(default)]
  pub upazila:               Option<String>,
  #[serde(default, alias = "ses")]
  pub socioeconomic_status:  Option<String>,
  #[serde(default, alias = "disability")]
  pub disability_status:     Option<String>,
  #[serde(default)]
  pub guardian_contact:      Option<String>,
  pub updated_at:            DateTime<Utc>,
}

impl SourceRecord for StudentRecord {
  fn business_key(&self) -> &str {
    &self.student_id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

/// A teacher roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherRecord {
  pub teacher_id:         String,
  #[serde(alias = "name")]
  pub full_name:          String,
  #[serde(default, alias = "sex")]
  pub gender:             Option<String>,
  #[serde(default)]
  pub school_id:          Option<String>,
  #[serde(default, alias = "specialty")]
  pub subject_specialty:  Option<String>,
  #[serde(default)]
  pub qualification:      Option<String>,
  #[serde(default)]
  pub hire_date:          Option<NaiveDate>,
  pub updated_at:         DateTime<Utc>,
}

impl SourceRecord for TeacherRecord {
  fn business_key(&self) -> &str {
    &self.teacher_id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

/// A school as registered with the directorate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolRecord {
  pub school_id:        String,
  #[serde(alias = "name")]
  pub school_name:      String,
  #[serde(default, alias = "type")]
  pub school_type:      Option<String>,
  #[serde(default, alias = "level")]
  pub education_level:  Option<String>,
  #[serde(default)]
  pub division:         Option<String>,
  #[serde(default)]
  pub district:         Option<String>,
  #[serde(default)]
  pub upazila:          Option<String>,
  #[serde(default)]
  pub geo_location:     Option<String>,
  pub updated_at:       DateTime<Utc>,
}

impl SourceRecord for SchoolRecord {
  fn business_key(&self) -> &str {
    &self.school_id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

// ─── Transactional entities ──────────────────────────────────────────────────

/// An enrollment event tying a student to a school for an academic year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
  pub enrollment_id:    String,
  pub student_id:       String,
  pub school_id:        String,
  #[serde(alias = "year")]
  pub academic_year:    String,
  #[serde(alias = "grade", alias = "class")]
  pub grade_level:      String,
  #[serde(default)]
  pub section:          Option<String>,
  #[serde(default)]
  pub status:           Option<String>,
  #[serde(alias = "date")]
  pub enrollment_date:  NaiveDate,
  #[serde(default)]
  pub dropout_reason:   Option<String>,
  pub updated_at:       DateTime<Utc>,
}

impl SourceRecord for EnrollmentRecord {
  fn business_key(&self) -> &str {
    &self.enrollment_id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

/// One student-day attendance mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub attendance_id:    String,
  pub student_id:       String,
  pub school_id:        String,
  #[serde(alias = "date")]
  pub attendance_date:  NaiveDate,
  #[serde(default)]
  pub status:           Option<String>,
  #[serde(default)]
  pub period:           Option<i64>,
  #[serde(default)]
  pub remarks:          Option<String>,
  pub updated_at:       DateTime<Utc>,
}

impl SourceRecord for AttendanceRecord {
  fn business_key(&self) -> &str {
    &self.attendance_id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

/// One graded assessment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
  #[serde(alias = "assessment_id")]
  pub result_id:        String,
  pub student_id:       String,
  pub school_id:        String,
  #[serde(default)]
  pub teacher_id:       Option<String>,
  #[serde(alias = "subject_name")]
  pub subject:          String,
  #[serde(default, alias = "exam_type")]
  pub assessment_type:  Option<String>,
  #[serde(default, alias = "grade", alias = "class")]
  pub grade_level:      Option<String>,
  #[serde(alias = "year")]
  pub academic_year:    String,
  #[serde(default)]
  pub term:             Option<String>,
  #[serde(alias = "exam_date", alias = "date")]
  pub assessment_date:  NaiveDate,
  #[serde(alias = "marks", alias = "score")]
  pub marks_obtained:   f64,
  #[serde(alias = "total_marks")]
  pub max_marks:        f64,
  pub updated_at:       DateTime<Utc>,
}

impl SourceRecord for AssessmentRecord {
  fn business_key(&self) -> &str {
    &self.result_id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn student_deserialises_from_aliased_fields() {
    let raw = r#"{
      "student_id": "stu-001",
      "name": "rahim uddin",
      "sex": "M",
      "dob": "2012-04-15",
      "division": "Dhaka",
      "district": "Dhaka",
      "ses": "low_income",
      "updated_at": "2024-01-01T06:30:00Z"
    }"#;
    let record: StudentRecord = serde_json::from_str(raw).unwrap();
    assert_eq!(record.student_id, "stu-001");
    assert_eq!(record.full_name, "rahim uddin");
    assert_eq!(record.gender.as_deref(), Some("M"));
    assert_eq!(
      record.date_of_birth,
      NaiveDate::from_ymd_opt(2012, 4, 15)
    );
    assert_eq!(record.socioeconomic_status.as_deref(), Some("low_income"));
    assert_eq!(record.upazila, None);
  }

  #[test]
  fn missing_business_key_fails_deserialisation() {
    let raw = r#"{"name": "x", "updated_at": "2024-01-01T00:00:00Z"}"#;
    assert!(serde_json::from_str::<StudentRecord>(raw).is_err());
  }

  #[test]
  fn assessment_accepts_both_mark_spellings() {
    let raw = r#"{
      "assessment_id": "RES-1",
      "student_id": "STU-1",
      "school_id": "SCH-1",
      "subject_name": "Mathematics",
      "year": "2024",
      "exam_date": "2024-03-10",
      "marks": 42.5,
      "total_marks": 50,
      "updated_at": "2024-03-11T00:00:00Z"
    }"#;
    let record: AssessmentRecord = serde_json::from_str(raw).unwrap();
    assert_eq!(record.result_id, "RES-1");
    assert_eq!(record.subject, "Mathematics");
    assert_eq!(record.marks_obtained, 42.5);
    assert_eq!(record.max_marks, 50.0);
    assert_eq!(record.term, None);
  }

  #[test]
  fn enrollment_grade_alias() {
    let raw = r#"{
      "enrollment_id": "ENR-1",
      "student_id": "STU-1",
      "school_id": "SCH-1",
      "year": "2024",
      "class": "Five",
      "date": "2024-01-10",
      "updated_at": "2024-01-10T00:00:00Z"
    }"#;
    let record: EnrollmentRecord = serde_json::from_str(raw).unwrap();
    assert_eq!(record.academic_year, "2024");
    assert_eq!(record.grade_level, "Five");
  }
}
