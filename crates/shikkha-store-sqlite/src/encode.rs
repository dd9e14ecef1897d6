//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed-width microsecond
//! precision and a `Z` suffix, so lexicographic order in SQL equals
//! chronological order. Dates are ISO `YYYY-MM-DD`. Vocabulary enums are
//! stored as their conformed labels. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use shikkha_core::{
  calendar::Term,
  dimension::{DimSchoolRow, DimStudentRow, DimTeacherRow, DimTimeRow},
  fact::{AssessmentFactRow, AttendanceFactRow, EnrollmentFactRow},
  grading::{GradeLetter, PerformanceBand},
  mart::{EquityMetricsRow, GapStats, GradeCounts, StudentPerformanceRow},
  normalize::{
    AttendanceStatus, EducationLevel, EnrollmentStatus, Gender, SchoolType,
    SesTier,
  },
  report::{RunRecord, RunReport, RunStatus, Stage},
  source::{
    AssessmentRecord, AttendanceRecord, EnrollmentRecord, SchoolRecord,
    Staged, StudentRecord, TeacherRecord,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String {
  d.format("%Y-%m-%d").to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_uuid(id: Uuid) -> String {
  id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Ok(Uuid::parse_str(s)?)
}

/// Decode a stored vocabulary label through the core `parse` function of
/// its enum, attributing failures to `column`.
pub fn decode_label<T>(
  column: &'static str,
  value: &str,
  parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T> {
  parse(value).ok_or_else(|| Error::BadLabel {
    column,
    value: value.to_owned(),
  })
}

// ─── Staged source rows ──────────────────────────────────────────────────────

pub struct RawStudent {
  pub source_seq:           i64,
  pub student_id:           String,
  pub full_name:            String,
  pub gender:               Option<String>,
  pub date_of_birth:        Option<String>,
  pub division:             Option<String>,
  pub district:             Option<String>,
  pub upazila:              Option<String>,
  pub socioeconomic_status: Option<String>,
  pub disability_status:    Option<String>,
  pub guardian_contact:     Option<String>,
  pub updated_at:           String,
}

impl RawStudent {
  pub fn into_staged(self) -> Result<Staged<StudentRecord>> {
    Ok(Staged {
      source_seq: self.source_seq,
      row:        StudentRecord {
        student_id:           self.student_id,
        full_name:            self.full_name,
        gender:               self.gender,
        date_of_birth:        self
          .date_of_birth
          .as_deref()
          .map(decode_date)
          .transpose()?,
        division:             self.division,
        district:             self.district,
        upazila:              self.upazila,
        socioeconomic_status: self.socioeconomic_status,
        disability_status:    self.disability_status,
        guardian_contact:     self.guardian_contact,
        updated_at:           decode_dt(&self.updated_at)?,
      },
    })
  }
}

pub struct RawTeacher {
  pub source_seq:        i64,
  pub teacher_id:        String,
  pub full_name:         String,
  pub gender:            Option<String>,
  pub school_id:         Option<String>,
  pub subject_specialty: Option<String>,
  pub qualification:     Option<String>,
  pub hire_date:         Option<String>,
  pub updated_at:        String,
}

impl RawTeacher {
  pub fn into_staged(self) -> Result<Staged<TeacherRecord>> {
    Ok(Staged {
      source_seq: self.source_seq,
      row:        TeacherRecord {
        teacher_id:        self.teacher_id,
        full_name:         self.full_name,
        gender:            self.gender,
        school_id:         self.school_id,
        subject_specialty: self.subject_specialty,
        qualification:     self.qualification,
        hire_date:         self
          .hire_date
          .as_deref()
          .map(decode_date)
          .transpose()?,
        updated_at:        decode_dt(&self.updated_at)?,
      },
    })
  }
}

pub struct RawSchool {
  pub source_seq:      i64,
  pub school_id:       String,
  pub school_name:     String,
  pub school_type:     Option<String>,
  pub education_level: Option<String>,
  pub division:        Option<String>,
  pub district:        Option<String>,
  pub upazila:         Option<String>,
  pub geo_location:    Option<String>,
  pub updated_at:      String,
}

impl RawSchool {
  pub fn into_staged(self) -> Result<Staged<SchoolRecord>> {
    Ok(Staged {
      source_seq: self.source_seq,
      row:        SchoolRecord {
        school_id:       self.school_id,
        school_name:     self.school_name,
        school_type:     self.school_type,
        education_level: self.education_level,
        division:        self.division,
        district:        self.district,
        upazila:         self.upazila,
        geo_location:    self.geo_location,
        updated_at:      decode_dt(&self.updated_at)?,
      },
    })
  }
}

pub struct RawEnrollment {
  pub source_seq:      i64,
  pub enrollment_id:   String,
  pub student_id:      String,
  pub school_id:       String,
  pub academic_year:   String,
  pub grade_level:     String,
  pub section:         Option<String>,
  pub status:          Option<String>,
  pub enrollment_date: String,
  pub dropout_reason:  Option<String>,
  pub updated_at:      String,
}

impl RawEnrollment {
  pub fn into_staged(self) -> Result<Staged<EnrollmentRecord>> {
    Ok(Staged {
      source_seq: self.source_seq,
      row:        EnrollmentRecord {
        enrollment_id:   self.enrollment_id,
        student_id:      self.student_id,
        school_id:       self.school_id,
        academic_year:   self.academic_year,
        grade_level:     self.grade_level,
        section:         self.section,
        status:          self.status,
        enrollment_date: decode_date(&self.enrollment_date)?,
        dropout_reason:  self.dropout_reason,
        updated_at:      decode_dt(&self.updated_at)?,
      },
    })
  }
}

pub struct RawAttendance {
  pub source_seq:      i64,
  pub attendance_id:   String,
  pub student_id:      String,
  pub school_id:       String,
  pub attendance_date: String,
  pub status:          Option<String>,
  pub period:          Option<i64>,
  pub remarks:         Option<String>,
  pub updated_at:      String,
}

impl RawAttendance {
  pub fn into_staged(self) -> Result<Staged<AttendanceRecord>> {
    Ok(Staged {
      source_seq: self.source_seq,
      row:        AttendanceRecord {
        attendance_id:   self.attendance_id,
        student_id:      self.student_id,
        school_id:       self.school_id,
        attendance_date: decode_date(&self.attendance_date)?,
        status:          self.status,
        period:          self.period,
        remarks:         self.remarks,
        updated_at:      decode_dt(&self.updated_at)?,
      },
    })
  }
}

pub struct RawAssessment {
  pub source_seq:      i64,
  pub result_id:       String,
  pub student_id:      String,
  pub school_id:       String,
  pub teacher_id:      Option<String>,
  pub subject:         String,
  pub assessment_type: Option<String>,
  pub grade_level:     Option<String>,
  pub academic_year:   String,
  pub term:            Option<String>,
  pub assessment_date: String,
  pub marks_obtained:  f64,
  pub max_marks:       f64,
  pub updated_at:      String,
}

impl RawAssessment {
  pub fn into_staged(self) -> Result<Staged<AssessmentRecord>> {
    Ok(Staged {
      source_seq: self.source_seq,
      row:        AssessmentRecord {
        result_id:       self.result_id,
        student_id:      self.student_id,
        school_id:       self.school_id,
        teacher_id:      self.teacher_id,
        subject:         self.subject,
        assessment_type: self.assessment_type,
        grade_level:     self.grade_level,
        academic_year:   self.academic_year,
        term:            self.term,
        assessment_date: decode_date(&self.assessment_date)?,
        marks_obtained:  self.marks_obtained,
        max_marks:       self.max_marks,
        updated_at:      decode_dt(&self.updated_at)?,
      },
    })
  }
}

// ─── Dimension rows ──────────────────────────────────────────────────────────

/// Raw strings read from `dim_students_v`.
pub struct RawDimStudent {
  pub surrogate_key:      String,
  pub student_id:         String,
  pub full_name:          String,
  pub gender:             String,
  pub date_of_birth:      Option<String>,
  pub division:           String,
  pub district:           String,
  pub upazila:            String,
  pub socioeconomic_tier: String,
  pub has_disability:     Option<bool>,
  pub guardian_contact:   Option<String>,
  pub age_group:          Option<String>,
  pub attr_hash:          String,
  pub effective_from:     String,
  pub effective_to:       String,
  pub is_current:         bool,
}

impl RawDimStudent {
  pub fn into_row(self) -> Result<DimStudentRow> {
    Ok(DimStudentRow {
      surrogate_key:      self.surrogate_key,
      student_id:         self.student_id,
      full_name:          self.full_name,
      gender:             decode_label("gender", &self.gender, Gender::parse)?,
      date_of_birth:      self
        .date_of_birth
        .as_deref()
        .map(decode_date)
        .transpose()?,
      division:           self.division,
      district:           self.district,
      upazila:            self.upazila,
      socioeconomic_tier: decode_label(
        "socioeconomic_tier",
        &self.socioeconomic_tier,
        SesTier::parse,
      )?,
      has_disability:     self.has_disability,
      guardian_contact:   self.guardian_contact,
      age_group:          self.age_group,
      attr_hash:          self.attr_hash,
      effective_from:     decode_dt(&self.effective_from)?,
      effective_to:       decode_dt(&self.effective_to)?,
      is_current:         self.is_current,
    })
  }
}

/// Raw strings read from `dim_teachers_v`.
pub struct RawDimTeacher {
  pub surrogate_key:     String,
  pub teacher_id:        String,
  pub full_name:         String,
  pub gender:            String,
  pub school_id:         Option<String>,
  pub subject_specialty: Option<String>,
  pub qualification:     Option<String>,
  pub hire_date:         Option<String>,
  pub attr_hash:         String,
  pub effective_from:    String,
  pub effective_to:      String,
  pub is_current:        bool,
}

impl RawDimTeacher {
  pub fn into_row(self) -> Result<DimTeacherRow> {
    Ok(DimTeacherRow {
      surrogate_key:     self.surrogate_key,
      teacher_id:        self.teacher_id,
      full_name:         self.full_name,
      gender:            decode_label("gender", &self.gender, Gender::parse)?,
      school_id:         self.school_id,
      subject_specialty: self.subject_specialty,
      qualification:     self.qualification,
      hire_date:         self
        .hire_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      attr_hash:         self.attr_hash,
      effective_from:    decode_dt(&self.effective_from)?,
      effective_to:      decode_dt(&self.effective_to)?,
      is_current:        self.is_current,
    })
  }
}

/// Raw strings read from `dim_schools_v`.
pub struct RawDimSchool {
  pub surrogate_key:   String,
  pub school_id:       String,
  pub school_name:     String,
  pub school_type:     String,
  pub education_level: String,
  pub division:        String,
  pub district:        String,
  pub upazila:         String,
  pub is_rural:        bool,
  pub geo_location:    Option<String>,
  pub attr_hash:       String,
  pub effective_from:  String,
  pub effective_to:    String,
  pub is_current:      bool,
}

impl RawDimSchool {
  pub fn into_row(self) -> Result<DimSchoolRow> {
    Ok(DimSchoolRow {
      surrogate_key:   self.surrogate_key,
      school_id:       self.school_id,
      school_name:     self.school_name,
      school_type:     decode_label(
        "school_type",
        &self.school_type,
        SchoolType::parse,
      )?,
      education_level: decode_label(
        "education_level",
        &self.education_level,
        EducationLevel::parse,
      )?,
      division:        self.division,
      district:        self.district,
      upazila:         self.upazila,
      is_rural:        self.is_rural,
      geo_location:    self.geo_location,
      attr_hash:       self.attr_hash,
      effective_from:  decode_dt(&self.effective_from)?,
      effective_to:    decode_dt(&self.effective_to)?,
      is_current:      self.is_current,
    })
  }
}

/// Raw strings read from `dim_time`.
pub struct RawTimeDay {
  pub date_key:      String,
  pub year:          i32,
  pub month:         u32,
  pub day:           u32,
  pub day_of_week:   String,
  pub academic_year: String,
  pub term:          String,
  pub is_weekend:    bool,
}

impl RawTimeDay {
  pub fn into_row(self) -> Result<DimTimeRow> {
    Ok(DimTimeRow {
      date_key:      decode_date(&self.date_key)?,
      year:          self.year,
      month:         self.month,
      day:           self.day,
      day_of_week:   self.day_of_week,
      academic_year: self.academic_year,
      term:          decode_label("term", &self.term, Term::parse)?,
      is_weekend:    self.is_weekend,
    })
  }
}

// ─── Fact rows ───────────────────────────────────────────────────────────────

pub struct RawEnrollmentFact {
  pub surrogate_key:  String,
  pub enrollment_id:  String,
  pub date_key:       String,
  pub student_sk:     String,
  pub school_sk:      String,
  pub geography_sk:   String,
  pub academic_year:  String,
  pub grade_level:    String,
  pub section:        Option<String>,
  pub status:         String,
  pub is_active:      bool,
  pub is_dropout:     bool,
  pub dropout_reason: Option<String>,
  pub updated_at:     String,
}

impl RawEnrollmentFact {
  pub fn into_row(self) -> Result<EnrollmentFactRow> {
    Ok(EnrollmentFactRow {
      surrogate_key:  self.surrogate_key,
      enrollment_id:  self.enrollment_id,
      student_sk:     self.student_sk,
      school_sk:      self.school_sk,
      geography_sk:   self.geography_sk,
      date_key:       decode_date(&self.date_key)?,
      academic_year:  self.academic_year,
      grade_level:    self.grade_level,
      section:        self.section,
      status:         decode_label(
        "status",
        &self.status,
        EnrollmentStatus::parse,
      )?,
      is_active:      self.is_active,
      is_dropout:     self.is_dropout,
      dropout_reason: self.dropout_reason,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAttendanceFact {
  pub surrogate_key:      String,
  pub attendance_id:      String,
  pub date_key:           String,
  pub student_sk:         String,
  pub school_sk:          String,
  pub geography_sk:       String,
  pub academic_year:      String,
  pub status:             String,
  pub is_present:         bool,
  pub counts_toward_rate: bool,
  pub period:             Option<i64>,
  pub updated_at:         String,
}

impl RawAttendanceFact {
  pub fn into_row(self) -> Result<AttendanceFactRow> {
    Ok(AttendanceFactRow {
      surrogate_key:      self.surrogate_key,
      attendance_id:      self.attendance_id,
      student_sk:         self.student_sk,
      school_sk:          self.school_sk,
      geography_sk:       self.geography_sk,
      date_key:           decode_date(&self.date_key)?,
      academic_year:      self.academic_year,
      status:             decode_label(
        "status",
        &self.status,
        AttendanceStatus::parse,
      )?,
      is_present:         self.is_present,
      counts_toward_rate: self.counts_toward_rate,
      period:             self.period,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAssessmentFact {
  pub surrogate_key:    String,
  pub result_id:        String,
  pub date_key:         String,
  pub student_sk:       String,
  pub school_sk:        String,
  pub teacher_sk:       Option<String>,
  pub geography_sk:     String,
  pub academic_year:    String,
  pub term:             Option<String>,
  pub subject:          String,
  pub assessment_type:  Option<String>,
  pub grade_level:      Option<String>,
  pub marks_obtained:   f64,
  pub max_marks:        f64,
  pub percentage:       f64,
  pub normalized_score: f64,
  pub grade_letter:     String,
  pub is_pass:          bool,
  pub performance_band: String,
  pub updated_at:       String,
}

impl RawAssessmentFact {
  pub fn into_row(self) -> Result<AssessmentFactRow> {
    Ok(AssessmentFactRow {
      surrogate_key:    self.surrogate_key,
      result_id:        self.result_id,
      student_sk:       self.student_sk,
      school_sk:        self.school_sk,
      teacher_sk:       self.teacher_sk,
      geography_sk:     self.geography_sk,
      date_key:         decode_date(&self.date_key)?,
      academic_year:    self.academic_year,
      term:             self.term,
      subject:          self.subject,
      assessment_type:  self.assessment_type,
      grade_level:      self.grade_level,
      marks_obtained:   self.marks_obtained,
      max_marks:        self.max_marks,
      percentage:       self.percentage,
      normalized_score: self.normalized_score,
      grade_letter:     decode_label(
        "grade_letter",
        &self.grade_letter,
        GradeLetter::parse,
      )?,
      is_pass:          self.is_pass,
      performance_band: decode_label(
        "performance_band",
        &self.performance_band,
        PerformanceBand::parse,
      )?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Mart rows ───────────────────────────────────────────────────────────────

pub struct RawStudentPerformance {
  pub student_id:       String,
  pub school_id:        String,
  pub academic_year:    String,
  pub student_name:     String,
  pub school_name:      String,
  pub division:         String,
  pub district:         String,
  pub assessment_count: i64,
  pub avg_percentage:   Option<f64>,
  pub pass_rate:        Option<f64>,
  pub performance_band: Option<String>,
  pub grades:           [i64; 7],
  pub school_days:      i64,
  pub present_days:     i64,
  pub absent_days:      i64,
  pub attendance_rate:  Option<f64>,
}

impl RawStudentPerformance {
  pub fn into_row(self) -> Result<StudentPerformanceRow> {
    let [a_plus, a, a_minus, b, c, d, f] = self.grades;
    Ok(StudentPerformanceRow {
      student_id:       self.student_id,
      school_id:        self.school_id,
      academic_year:    self.academic_year,
      student_name:     self.student_name,
      school_name:      self.school_name,
      division:         self.division,
      district:         self.district,
      assessment_count: self.assessment_count,
      avg_percentage:   self.avg_percentage,
      pass_rate:        self.pass_rate,
      performance_band: self
        .performance_band
        .as_deref()
        .map(|v| decode_label("performance_band", v, PerformanceBand::parse))
        .transpose()?,
      grades:           GradeCounts { a_plus, a, a_minus, b, c, d, f },
      school_days:      self.school_days,
      present_days:     self.present_days,
      absent_days:      self.absent_days,
      attendance_rate:  self.attendance_rate,
    })
  }
}

/// One subgroup pair as stored in six flat `mart_equity_metrics` columns.
pub struct RawGapStats {
  pub advantaged_count:    i64,
  pub disadvantaged_count: i64,
  pub advantaged_avg:      Option<f64>,
  pub disadvantaged_avg:   Option<f64>,
  pub gap:                 Option<f64>,
  pub is_equitable:        Option<bool>,
}

impl RawGapStats {
  pub fn into_stats(self) -> GapStats {
    GapStats {
      advantaged_count:    self.advantaged_count,
      disadvantaged_count: self.disadvantaged_count,
      advantaged_avg:      self.advantaged_avg,
      disadvantaged_avg:   self.disadvantaged_avg,
      gap:                 self.gap,
      is_equitable:        self.is_equitable,
    }
  }
}

pub struct RawEquityMetrics {
  pub division:      String,
  pub district:      String,
  pub school_type:   String,
  pub academic_year: String,
  pub grade_level:   String,
  pub result_count:  i64,
  pub student_count: i64,
  pub avg_score:     f64,
  pub pass_rate:     f64,
  pub gender:        RawGapStats,
  pub socioeconomic: RawGapStats,
  pub disability:    RawGapStats,
  pub location:      RawGapStats,
}

impl RawEquityMetrics {
  pub fn into_row(self) -> Result<EquityMetricsRow> {
    Ok(EquityMetricsRow {
      division:      self.division,
      district:      self.district,
      school_type:   decode_label(
        "school_type",
        &self.school_type,
        SchoolType::parse,
      )?,
      academic_year: self.academic_year,
      grade_level:   self.grade_level,
      result_count:  self.result_count,
      student_count: self.student_count,
      avg_score:     self.avg_score,
      pass_rate:     self.pass_rate,
      gender:        self.gender.into_stats(),
      socioeconomic: self.socioeconomic.into_stats(),
      disability:    self.disability.into_stats(),
      location:      self.location.into_stats(),
    })
  }
}

// ─── Run log rows ────────────────────────────────────────────────────────────

pub struct RawRunRecord {
  pub run_id:           String,
  pub stage:            String,
  pub window_from:      Option<String>,
  pub window_to:        Option<String>,
  pub started_at:       String,
  pub finished_at:      Option<String>,
  pub status:           String,
  pub source_watermark: Option<String>,
  pub report_json:      Option<String>,
}

impl RawRunRecord {
  pub fn into_record(self) -> Result<RunRecord> {
    let window = match (self.window_from, self.window_to) {
      (Some(from), Some(to)) => {
        let from = shikkha_core::calendar::YearMonth::parse(&from)
          .map_err(Error::Core)?;
        let to = shikkha_core::calendar::YearMonth::parse(&to)
          .map_err(Error::Core)?;
        Some(
          shikkha_core::calendar::LoadWindow::new(from, to)
            .map_err(Error::Core)?,
        )
      }
      _ => None,
    };
    let report: Option<RunReport> = self
      .report_json
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;
    Ok(RunRecord {
      run_id: decode_uuid(&self.run_id)?,
      stage: decode_label("stage", &self.stage, Stage::parse)?,
      window,
      started_at: decode_dt(&self.started_at)?,
      finished_at: self
        .finished_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      status: decode_label("status", &self.status, RunStatus::parse)?,
      source_watermark: self
        .source_watermark
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      report,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use shikkha_core::dimension::far_future;

  use super::*;

  #[test]
  fn timestamps_encode_fixed_width() {
    let dt = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    assert_eq!(encode_dt(dt), "2024-06-01T00:00:00.000000Z");
    assert_eq!(decode_dt("2024-06-01T00:00:00.000000Z").unwrap(), dt);
    // Offset forms still decode.
    assert_eq!(decode_dt("2024-06-01T00:00:00+00:00").unwrap(), dt);
  }

  #[test]
  fn far_future_matches_the_schema_sentinel() {
    // The literal embedded in the dim_*_v views must round-trip to the
    // sentinel used by the builders.
    assert_eq!(encode_dt(far_future()), "9999-12-31T00:00:00.000000Z");
  }

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
    let c = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut encoded = vec![encode_dt(c), encode_dt(a), encode_dt(b)];
    encoded.sort();
    assert_eq!(encoded, vec![encode_dt(a), encode_dt(b), encode_dt(c)]);
  }

  #[test]
  fn dates_round_trip() {
    let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(encode_date(d), "2024-02-29");
    assert_eq!(decode_date("2024-02-29").unwrap(), d);
    assert!(decode_date("2024-02-30").is_err());
  }

  #[test]
  fn unknown_labels_are_reported_with_their_column() {
    let err = decode_label("gender", "banana", Gender::parse).unwrap_err();
    match err {
      Error::BadLabel { column, value } => {
        assert_eq!(column, "gender");
        assert_eq!(value, "banana");
      }
      other => panic!("unexpected error: {other}"),
    }
  }
}
