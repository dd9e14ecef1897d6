//! [`SqliteWarehouse`] — the SQLite implementation of [`Warehouse`].

use std::path::Path;

use chrono::{DateTime, Utc};
use shikkha_core::{
  dimension::{
    DimGeographyRow, DimSchoolRow, DimStudentRow, DimTeacherRow, DimTimeRow,
  },
  fact::{AssessmentFactRow, AttendanceFactRow, EnrollmentFactRow},
  mart::{EquityMetricsRow, StudentPerformanceRow},
  report::{RunRecord, Stage},
  source::{
    AssessmentRecord, AttendanceRecord, EnrollmentRecord, SchoolRecord,
    Staged, StudentRecord, TeacherRecord,
  },
  store::{FactPartition, Warehouse},
};

use crate::{
  encode::{
    RawAssessment, RawAssessmentFact, RawAttendance, RawAttendanceFact,
    RawDimSchool, RawDimStudent, RawDimTeacher, RawEnrollment,
    RawEnrollmentFact, RawEquityMetrics, RawGapStats, RawRunRecord,
    RawSchool, RawStudent, RawStudentPerformance, RawTeacher, RawTimeDay,
    decode_dt, encode_date, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Every persistent table, in layer order; drives [`Warehouse::row_counts`].
const TABLES: [&str; 17] = [
  "raw_students",
  "raw_teachers",
  "raw_schools",
  "raw_enrollments",
  "raw_attendances",
  "raw_assessments",
  "dim_students",
  "dim_teachers",
  "dim_schools",
  "dim_geography",
  "dim_time",
  "fct_enrollments",
  "fct_attendances",
  "fct_assessment_results",
  "mart_student_performance",
  "mart_equity_metrics",
  "run_log",
];

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Shikkha warehouse backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_owned();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Raw layer — appends ───────────────────────────────────────────────

  async fn append_students(&self, rows: Vec<StudentRecord>) -> Result<u64> {
    let loaded_at = encode_dt(Utc::now());
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_students (
               student_id, full_name, gender, date_of_birth, division,
               district, upazila, socioeconomic_status, disability_status,
               guardian_contact, updated_at, loaded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.student_id,
              row.full_name,
              row.gender,
              row.date_of_birth.map(encode_date),
              row.division,
              row.district,
              row.upazila,
              row.socioeconomic_status,
              row.disability_status,
              row.guardian_contact,
              encode_dt(row.updated_at),
              loaded_at,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn append_teachers(&self, rows: Vec<TeacherRecord>) -> Result<u64> {
    let loaded_at = encode_dt(Utc::now());
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_teachers (
               teacher_id, full_name, gender, school_id, subject_specialty,
               qualification, hire_date, updated_at, loaded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.teacher_id,
              row.full_name,
              row.gender,
              row.school_id,
              row.subject_specialty,
              row.qualification,
              row.hire_date.map(encode_date),
              encode_dt(row.updated_at),
              loaded_at,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn append_schools(&self, rows: Vec<SchoolRecord>) -> Result<u64> {
    let loaded_at = encode_dt(Utc::now());
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_schools (
               school_id, school_name, school_type, education_level,
               division, district, upazila, geo_location, updated_at,
               loaded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.school_id,
              row.school_name,
              row.school_type,
              row.education_level,
              row.division,
              row.district,
              row.upazila,
              row.geo_location,
              encode_dt(row.updated_at),
              loaded_at,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn append_enrollments(
    &self,
    rows: Vec<EnrollmentRecord>,
  ) -> Result<u64> {
    let loaded_at = encode_dt(Utc::now());
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_enrollments (
               enrollment_id, student_id, school_id, academic_year,
               grade_level, section, status, enrollment_date,
               dropout_reason, updated_at, loaded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.enrollment_id,
              row.student_id,
              row.school_id,
              row.academic_year,
              row.grade_level,
              row.section,
              row.status,
              encode_date(row.enrollment_date),
              row.dropout_reason,
              encode_dt(row.updated_at),
              loaded_at,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn append_attendances(
    &self,
    rows: Vec<AttendanceRecord>,
  ) -> Result<u64> {
    let loaded_at = encode_dt(Utc::now());
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_attendances (
               attendance_id, student_id, school_id, attendance_date,
               status, period, remarks, updated_at, loaded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.attendance_id,
              row.student_id,
              row.school_id,
              encode_date(row.attendance_date),
              row.status,
              row.period,
              row.remarks,
              encode_dt(row.updated_at),
              loaded_at,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn append_assessments(
    &self,
    rows: Vec<AssessmentRecord>,
  ) -> Result<u64> {
    let loaded_at = encode_dt(Utc::now());
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_assessments (
               result_id, student_id, school_id, teacher_id, subject,
               assessment_type, grade_level, academic_year, term,
               assessment_date, marks_obtained, max_marks, updated_at,
               loaded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.result_id,
              row.student_id,
              row.school_id,
              row.teacher_id,
              row.subject,
              row.assessment_type,
              row.grade_level,
              row.academic_year,
              row.term,
              encode_date(row.assessment_date),
              row.marks_obtained,
              row.max_marks,
              encode_dt(row.updated_at),
              loaded_at,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  // ── Staging layer — reads ─────────────────────────────────────────────

  async fn staged_students(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Staged<StudentRecord>>> {
    let since = since.map(encode_dt);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_seq, student_id, full_name, gender, date_of_birth,
                  division, district, upazila, socioeconomic_status,
                  disability_status, guardian_contact, updated_at
           FROM stg_students
           WHERE ?1 IS NULL OR updated_at > ?1
           ORDER BY source_seq",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since], |r| {
            Ok(RawStudent {
              source_seq:           r.get(0)?,
              student_id:           r.get(1)?,
              full_name:            r.get(2)?,
              gender:               r.get(3)?,
              date_of_birth:        r.get(4)?,
              division:             r.get(5)?,
              district:             r.get(6)?,
              upazila:              r.get(7)?,
              socioeconomic_status: r.get(8)?,
              disability_status:    r.get(9)?,
              guardian_contact:     r.get(10)?,
              updated_at:           r.get(11)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawStudent::into_staged).collect()
  }

  async fn staged_teachers(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Staged<TeacherRecord>>> {
    let since = since.map(encode_dt);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_seq, teacher_id, full_name, gender, school_id,
                  subject_specialty, qualification, hire_date, updated_at
           FROM stg_teachers
           WHERE ?1 IS NULL OR updated_at > ?1
           ORDER BY source_seq",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since], |r| {
            Ok(RawTeacher {
              source_seq:        r.get(0)?,
              teacher_id:        r.get(1)?,
              full_name:         r.get(2)?,
              gender:            r.get(3)?,
              school_id:         r.get(4)?,
              subject_specialty: r.get(5)?,
              qualification:     r.get(6)?,
              hire_date:         r.get(7)?,
              updated_at:        r.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawTeacher::into_staged).collect()
  }

  async fn staged_schools(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Staged<SchoolRecord>>> {
    let since = since.map(encode_dt);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_seq, school_id, school_name, school_type,
                  education_level, division, district, upazila,
                  geo_location, updated_at
           FROM stg_schools
           WHERE ?1 IS NULL OR updated_at > ?1
           ORDER BY source_seq",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since], |r| {
            Ok(RawSchool {
              source_seq:      r.get(0)?,
              school_id:       r.get(1)?,
              school_name:     r.get(2)?,
              school_type:     r.get(3)?,
              education_level: r.get(4)?,
              division:        r.get(5)?,
              district:        r.get(6)?,
              upazila:         r.get(7)?,
              geo_location:    r.get(8)?,
              updated_at:      r.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSchool::into_staged).collect()
  }

  async fn staged_enrollments(&self) -> Result<Vec<Staged<EnrollmentRecord>>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_seq, enrollment_id, student_id, school_id,
                  academic_year, grade_level, section, status,
                  enrollment_date, dropout_reason, updated_at
           FROM stg_enrollments
           ORDER BY source_seq",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawEnrollment {
              source_seq:      r.get(0)?,
              enrollment_id:   r.get(1)?,
              student_id:      r.get(2)?,
              school_id:       r.get(3)?,
              academic_year:   r.get(4)?,
              grade_level:     r.get(5)?,
              section:         r.get(6)?,
              status:          r.get(7)?,
              enrollment_date: r.get(8)?,
              dropout_reason:  r.get(9)?,
              updated_at:      r.get(10)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawEnrollment::into_staged).collect()
  }

  async fn staged_attendances(&self) -> Result<Vec<Staged<AttendanceRecord>>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_seq, attendance_id, student_id, school_id,
                  attendance_date, status, period, remarks, updated_at
           FROM stg_attendances
           ORDER BY source_seq",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawAttendance {
              source_seq:      r.get(0)?,
              attendance_id:   r.get(1)?,
              student_id:      r.get(2)?,
              school_id:       r.get(3)?,
              attendance_date: r.get(4)?,
              status:          r.get(5)?,
              period:          r.get(6)?,
              remarks:         r.get(7)?,
              updated_at:      r.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAttendance::into_staged).collect()
  }

  async fn staged_assessments(&self) -> Result<Vec<Staged<AssessmentRecord>>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_seq, result_id, student_id, school_id, teacher_id,
                  subject, assessment_type, grade_level, academic_year,
                  term, assessment_date, marks_obtained, max_marks,
                  updated_at
           FROM stg_assessments
           ORDER BY source_seq",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawAssessment {
              source_seq:      r.get(0)?,
              result_id:       r.get(1)?,
              student_id:      r.get(2)?,
              school_id:       r.get(3)?,
              teacher_id:      r.get(4)?,
              subject:         r.get(5)?,
              assessment_type: r.get(6)?,
              grade_level:     r.get(7)?,
              academic_year:   r.get(8)?,
              term:            r.get(9)?,
              assessment_date: r.get(10)?,
              marks_obtained:  r.get(11)?,
              max_marks:       r.get(12)?,
              updated_at:      r.get(13)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAssessment::into_staged).collect()
  }

  async fn staged_dim_high_water(
    &self,
    until: DateTime<Utc>,
  ) -> Result<Option<DateTime<Utc>>> {
    let until = encode_dt(until);
    let max: Option<String> = self
      .conn
      .call(move |conn| {
        let max = conn.query_row(
          "SELECT MAX(u) FROM (
             SELECT MAX(updated_at) AS u FROM raw_students
              WHERE updated_at <= ?1
             UNION ALL
             SELECT MAX(updated_at) FROM raw_teachers
              WHERE updated_at <= ?1
             UNION ALL
             SELECT MAX(updated_at) FROM raw_schools
              WHERE updated_at <= ?1
           )",
          rusqlite::params![until],
          |r| r.get(0),
        )?;
        Ok(max)
      })
      .await?;
    max.as_deref().map(decode_dt).transpose()
  }

  // ── Dimensions ────────────────────────────────────────────────────────

  async fn append_student_versions(
    &self,
    rows: Vec<DimStudentRow>,
  ) -> Result<u64> {
    let offered = rows.len() as u64;
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO dim_students (
               surrogate_key, student_id, full_name, gender, date_of_birth,
               division, district, upazila, socioeconomic_tier,
               has_disability, guardian_contact, age_group, attr_hash,
               effective_from
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.surrogate_key,
              row.student_id,
              row.full_name,
              row.gender.as_str(),
              row.date_of_birth.map(encode_date),
              row.division,
              row.district,
              row.upazila,
              row.socioeconomic_tier.as_str(),
              row.has_disability,
              row.guardian_contact,
              row.age_group,
              row.attr_hash,
              encode_dt(row.effective_from),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(offered)
  }

  async fn append_teacher_versions(
    &self,
    rows: Vec<DimTeacherRow>,
  ) -> Result<u64> {
    let offered = rows.len() as u64;
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO dim_teachers (
               surrogate_key, teacher_id, full_name, gender, school_id,
               subject_specialty, qualification, hire_date, attr_hash,
               effective_from
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.surrogate_key,
              row.teacher_id,
              row.full_name,
              row.gender.as_str(),
              row.school_id,
              row.subject_specialty,
              row.qualification,
              row.hire_date.map(encode_date),
              row.attr_hash,
              encode_dt(row.effective_from),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(offered)
  }

  async fn append_school_versions(
    &self,
    rows: Vec<DimSchoolRow>,
  ) -> Result<u64> {
    let offered = rows.len() as u64;
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO dim_schools (
               surrogate_key, school_id, school_name, school_type,
               education_level, division, district, upazila, is_rural,
               geo_location, attr_hash, effective_from
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.surrogate_key,
              row.school_id,
              row.school_name,
              row.school_type.as_str(),
              row.education_level.as_str(),
              row.division,
              row.district,
              row.upazila,
              row.is_rural,
              row.geo_location,
              row.attr_hash,
              encode_dt(row.effective_from),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(offered)
  }

  async fn student_versions(&self) -> Result<Vec<DimStudentRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, student_id, full_name, gender,
                  date_of_birth, division, district, upazila,
                  socioeconomic_tier, has_disability, guardian_contact,
                  age_group, attr_hash, effective_from, effective_to,
                  is_current
           FROM dim_students_v
           ORDER BY student_id, effective_from",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawDimStudent {
              surrogate_key:      r.get(0)?,
              student_id:         r.get(1)?,
              full_name:          r.get(2)?,
              gender:             r.get(3)?,
              date_of_birth:      r.get(4)?,
              division:           r.get(5)?,
              district:           r.get(6)?,
              upazila:            r.get(7)?,
              socioeconomic_tier: r.get(8)?,
              has_disability:     r.get(9)?,
              guardian_contact:   r.get(10)?,
              age_group:          r.get(11)?,
              attr_hash:          r.get(12)?,
              effective_from:     r.get(13)?,
              effective_to:       r.get(14)?,
              is_current:         r.get(15)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawDimStudent::into_row).collect()
  }

  async fn teacher_versions(&self) -> Result<Vec<DimTeacherRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, teacher_id, full_name, gender, school_id,
                  subject_specialty, qualification, hire_date, attr_hash,
                  effective_from, effective_to, is_current
           FROM dim_teachers_v
           ORDER BY teacher_id, effective_from",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawDimTeacher {
              surrogate_key:     r.get(0)?,
              teacher_id:        r.get(1)?,
              full_name:         r.get(2)?,
              gender:            r.get(3)?,
              school_id:         r.get(4)?,
              subject_specialty: r.get(5)?,
              qualification:     r.get(6)?,
              hire_date:         r.get(7)?,
              attr_hash:         r.get(8)?,
              effective_from:    r.get(9)?,
              effective_to:      r.get(10)?,
              is_current:        r.get(11)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawDimTeacher::into_row).collect()
  }

  async fn school_versions(&self) -> Result<Vec<DimSchoolRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, school_id, school_name, school_type,
                  education_level, division, district, upazila, is_rural,
                  geo_location, attr_hash, effective_from, effective_to,
                  is_current
           FROM dim_schools_v
           ORDER BY school_id, effective_from",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawDimSchool {
              surrogate_key:   r.get(0)?,
              school_id:       r.get(1)?,
              school_name:     r.get(2)?,
              school_type:     r.get(3)?,
              education_level: r.get(4)?,
              division:        r.get(5)?,
              district:        r.get(6)?,
              upazila:         r.get(7)?,
              is_rural:        r.get(8)?,
              geo_location:    r.get(9)?,
              attr_hash:       r.get(10)?,
              effective_from:  r.get(11)?,
              effective_to:    r.get(12)?,
              is_current:      r.get(13)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawDimSchool::into_row).collect()
  }

  async fn upsert_geographies(
    &self,
    rows: Vec<DimGeographyRow>,
  ) -> Result<u64> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO dim_geography (
               surrogate_key, division, district, upazila, is_urban
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for row in &rows {
            inserted += stmt.execute(rusqlite::params![
              row.surrogate_key,
              row.division,
              row.district,
              row.upazila,
              row.is_urban,
            ])? as u64;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn geographies(&self) -> Result<Vec<DimGeographyRow>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, division, district, upazila, is_urban
           FROM dim_geography
           ORDER BY division, district, upazila",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(DimGeographyRow {
              surrogate_key: r.get(0)?,
              division:      r.get(1)?,
              district:      r.get(2)?,
              upazila:       r.get(3)?,
              is_urban:      r.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn upsert_time(&self, rows: Vec<DimTimeRow>) -> Result<u64> {
    let offered = rows.len() as u64;
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO dim_time (
               date_key, year, month, day, day_of_week, academic_year,
               term, is_weekend
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              encode_date(row.date_key),
              row.year,
              row.month,
              row.day,
              row.day_of_week,
              row.academic_year,
              row.term.as_str(),
              row.is_weekend,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(offered)
  }

  async fn time_days(&self) -> Result<Vec<DimTimeRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT date_key, year, month, day, day_of_week, academic_year,
                  term, is_weekend
           FROM dim_time
           ORDER BY date_key",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawTimeDay {
              date_key:      r.get(0)?,
              year:          r.get(1)?,
              month:         r.get(2)?,
              day:           r.get(3)?,
              day_of_week:   r.get(4)?,
              academic_year: r.get(5)?,
              term:          r.get(6)?,
              is_weekend:    r.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawTimeDay::into_row).collect()
  }

  // ── Facts — partition replacement ─────────────────────────────────────

  async fn replace_enrollment_partitions(
    &self,
    partitions: Vec<FactPartition<EnrollmentFactRow>>,
  ) -> Result<u64> {
    let written = self
      .conn
      .call(move |conn| {
        let mut written = 0u64;
        for (month, rows) in &partitions {
          let label = month.label();
          let tx = conn.transaction()?;
          tx.execute(
            "DELETE FROM fct_enrollments WHERE partition_key = ?1",
            rusqlite::params![label],
          )?;
          {
            let mut stmt = tx.prepare(
              "INSERT INTO fct_enrollments (
                 surrogate_key, enrollment_id, partition_key, date_key,
                 student_sk, school_sk, geography_sk, academic_year,
                 grade_level, section, status, is_active, is_dropout,
                 dropout_reason, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15)",
            )?;
            for row in rows {
              stmt.execute(rusqlite::params![
                row.surrogate_key,
                row.enrollment_id,
                label,
                encode_date(row.date_key),
                row.student_sk,
                row.school_sk,
                row.geography_sk,
                row.academic_year,
                row.grade_level,
                row.section,
                row.status.as_str(),
                row.is_active,
                row.is_dropout,
                row.dropout_reason,
                encode_dt(row.updated_at),
              ])?;
              written += 1;
            }
          }
          tx.commit()?;
        }
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn replace_attendance_partitions(
    &self,
    partitions: Vec<FactPartition<AttendanceFactRow>>,
  ) -> Result<u64> {
    let written = self
      .conn
      .call(move |conn| {
        let mut written = 0u64;
        for (month, rows) in &partitions {
          let label = month.label();
          let tx = conn.transaction()?;
          tx.execute(
            "DELETE FROM fct_attendances WHERE partition_key = ?1",
            rusqlite::params![label],
          )?;
          {
            let mut stmt = tx.prepare(
              "INSERT INTO fct_attendances (
                 surrogate_key, attendance_id, partition_key, date_key,
                 student_sk, school_sk, geography_sk, academic_year,
                 status, is_present, counts_toward_rate, period,
                 updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13)",
            )?;
            for row in rows {
              stmt.execute(rusqlite::params![
                row.surrogate_key,
                row.attendance_id,
                label,
                encode_date(row.date_key),
                row.student_sk,
                row.school_sk,
                row.geography_sk,
                row.academic_year,
                row.status.as_str(),
                row.is_present,
                row.counts_toward_rate,
                row.period,
                encode_dt(row.updated_at),
              ])?;
              written += 1;
            }
          }
          tx.commit()?;
        }
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn replace_assessment_partitions(
    &self,
    partitions: Vec<FactPartition<AssessmentFactRow>>,
  ) -> Result<u64> {
    let written = self
      .conn
      .call(move |conn| {
        let mut written = 0u64;
        for (month, rows) in &partitions {
          let label = month.label();
          let tx = conn.transaction()?;
          tx.execute(
            "DELETE FROM fct_assessment_results WHERE partition_key = ?1",
            rusqlite::params![label],
          )?;
          {
            let mut stmt = tx.prepare(
              "INSERT INTO fct_assessment_results (
                 surrogate_key, result_id, partition_key, date_key,
                 student_sk, school_sk, teacher_sk, geography_sk,
                 academic_year, term, subject, assessment_type,
                 grade_level, marks_obtained, max_marks, percentage,
                 normalized_score, grade_letter, is_pass,
                 performance_band, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                         ?21)",
            )?;
            for row in rows {
              stmt.execute(rusqlite::params![
                row.surrogate_key,
                row.result_id,
                label,
                encode_date(row.date_key),
                row.student_sk,
                row.school_sk,
                row.teacher_sk,
                row.geography_sk,
                row.academic_year,
                row.term,
                row.subject,
                row.assessment_type,
                row.grade_level,
                row.marks_obtained,
                row.max_marks,
                row.percentage,
                row.normalized_score,
                row.grade_letter.as_str(),
                row.is_pass,
                row.performance_band.as_str(),
                encode_dt(row.updated_at),
              ])?;
              written += 1;
            }
          }
          tx.commit()?;
        }
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn enrollment_facts(&self) -> Result<Vec<EnrollmentFactRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, enrollment_id, date_key, student_sk,
                  school_sk, geography_sk, academic_year, grade_level,
                  section, status, is_active, is_dropout, dropout_reason,
                  updated_at
           FROM fct_enrollments
           ORDER BY partition_key, date_key, enrollment_id",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawEnrollmentFact {
              surrogate_key:  r.get(0)?,
              enrollment_id:  r.get(1)?,
              date_key:       r.get(2)?,
              student_sk:     r.get(3)?,
              school_sk:      r.get(4)?,
              geography_sk:   r.get(5)?,
              academic_year:  r.get(6)?,
              grade_level:    r.get(7)?,
              section:        r.get(8)?,
              status:         r.get(9)?,
              is_active:      r.get(10)?,
              is_dropout:     r.get(11)?,
              dropout_reason: r.get(12)?,
              updated_at:     r.get(13)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawEnrollmentFact::into_row).collect()
  }

  async fn attendance_facts(&self) -> Result<Vec<AttendanceFactRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, attendance_id, date_key, student_sk,
                  school_sk, geography_sk, academic_year, status,
                  is_present, counts_toward_rate, period, updated_at
           FROM fct_attendances
           ORDER BY partition_key, date_key, attendance_id",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawAttendanceFact {
              surrogate_key:      r.get(0)?,
              attendance_id:      r.get(1)?,
              date_key:           r.get(2)?,
              student_sk:         r.get(3)?,
              school_sk:          r.get(4)?,
              geography_sk:       r.get(5)?,
              academic_year:      r.get(6)?,
              status:             r.get(7)?,
              is_present:         r.get(8)?,
              counts_toward_rate: r.get(9)?,
              period:             r.get(10)?,
              updated_at:         r.get(11)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAttendanceFact::into_row).collect()
  }

  async fn assessment_facts(&self) -> Result<Vec<AssessmentFactRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT surrogate_key, result_id, date_key, student_sk,
                  school_sk, teacher_sk, geography_sk, academic_year, term,
                  subject, assessment_type, grade_level, marks_obtained,
                  max_marks, percentage, normalized_score, grade_letter,
                  is_pass, performance_band, updated_at
           FROM fct_assessment_results
           ORDER BY partition_key, date_key, result_id",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawAssessmentFact {
              surrogate_key:    r.get(0)?,
              result_id:        r.get(1)?,
              date_key:         r.get(2)?,
              student_sk:       r.get(3)?,
              school_sk:        r.get(4)?,
              teacher_sk:       r.get(5)?,
              geography_sk:     r.get(6)?,
              academic_year:    r.get(7)?,
              term:             r.get(8)?,
              subject:          r.get(9)?,
              assessment_type:  r.get(10)?,
              grade_level:      r.get(11)?,
              marks_obtained:   r.get(12)?,
              max_marks:        r.get(13)?,
              percentage:       r.get(14)?,
              normalized_score: r.get(15)?,
              grade_letter:     r.get(16)?,
              is_pass:          r.get(17)?,
              performance_band: r.get(18)?,
              updated_at:       r.get(19)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAssessmentFact::into_row).collect()
  }

  // ── Marts — full refresh ──────────────────────────────────────────────

  async fn replace_student_performance(
    &self,
    rows: Vec<StudentPerformanceRow>,
  ) -> Result<u64> {
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM mart_student_performance", [])?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO mart_student_performance (
               student_id, school_id, academic_year, student_name,
               school_name, division, district, assessment_count,
               avg_percentage, pass_rate, performance_band, grade_a_plus,
               grade_a, grade_a_minus, grade_b, grade_c, grade_d, grade_f,
               school_days, present_days, absent_days, attendance_rate
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.student_id,
              row.school_id,
              row.academic_year,
              row.student_name,
              row.school_name,
              row.division,
              row.district,
              row.assessment_count,
              row.avg_percentage,
              row.pass_rate,
              row.performance_band.map(|b| b.as_str()),
              row.grades.a_plus,
              row.grades.a,
              row.grades.a_minus,
              row.grades.b,
              row.grades.c,
              row.grades.d,
              row.grades.f,
              row.school_days,
              row.present_days,
              row.absent_days,
              row.attendance_rate,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn replace_equity_metrics(
    &self,
    rows: Vec<EquityMetricsRow>,
  ) -> Result<u64> {
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM mart_equity_metrics", [])?;
        let mut written = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO mart_equity_metrics (
               division, district, school_type, academic_year, grade_level,
               result_count, student_count, avg_score, pass_rate,
               gender_male_count, gender_female_count, gender_male_avg,
               gender_female_avg, gender_gap, gender_equitable,
               ses_nonlow_count, ses_low_count, ses_nonlow_avg,
               ses_low_avg, ses_gap, ses_equitable,
               disability_without_count, disability_with_count,
               disability_without_avg, disability_with_avg, disability_gap,
               disability_equitable, location_urban_count,
               location_rural_count, location_urban_avg,
               location_rural_avg, location_gap, location_equitable
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                       ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32,
                       ?33)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.division,
              row.district,
              row.school_type.as_str(),
              row.academic_year,
              row.grade_level,
              row.result_count,
              row.student_count,
              row.avg_score,
              row.pass_rate,
              row.gender.advantaged_count,
              row.gender.disadvantaged_count,
              row.gender.advantaged_avg,
              row.gender.disadvantaged_avg,
              row.gender.gap,
              row.gender.is_equitable,
              row.socioeconomic.advantaged_count,
              row.socioeconomic.disadvantaged_count,
              row.socioeconomic.advantaged_avg,
              row.socioeconomic.disadvantaged_avg,
              row.socioeconomic.gap,
              row.socioeconomic.is_equitable,
              row.disability.advantaged_count,
              row.disability.disadvantaged_count,
              row.disability.advantaged_avg,
              row.disability.disadvantaged_avg,
              row.disability.gap,
              row.disability.is_equitable,
              row.location.advantaged_count,
              row.location.disadvantaged_count,
              row.location.advantaged_avg,
              row.location.disadvantaged_avg,
              row.location.gap,
              row.location.is_equitable,
            ])?;
            written += 1;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn student_performance(&self) -> Result<Vec<StudentPerformanceRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT student_id, school_id, academic_year, student_name,
                  school_name, division, district, assessment_count,
                  avg_percentage, pass_rate, performance_band,
                  grade_a_plus, grade_a, grade_a_minus, grade_b, grade_c,
                  grade_d, grade_f, school_days, present_days, absent_days,
                  attendance_rate
           FROM mart_student_performance
           ORDER BY academic_year, school_id, student_id",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawStudentPerformance {
              student_id:       r.get(0)?,
              school_id:        r.get(1)?,
              academic_year:    r.get(2)?,
              student_name:     r.get(3)?,
              school_name:      r.get(4)?,
              division:         r.get(5)?,
              district:         r.get(6)?,
              assessment_count: r.get(7)?,
              avg_percentage:   r.get(8)?,
              pass_rate:        r.get(9)?,
              performance_band: r.get(10)?,
              grades:           [
                r.get(11)?,
                r.get(12)?,
                r.get(13)?,
                r.get(14)?,
                r.get(15)?,
                r.get(16)?,
                r.get(17)?,
              ],
              school_days:      r.get(18)?,
              present_days:     r.get(19)?,
              absent_days:      r.get(20)?,
              attendance_rate:  r.get(21)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws
      .into_iter()
      .map(RawStudentPerformance::into_row)
      .collect()
  }

  async fn equity_metrics(&self) -> Result<Vec<EquityMetricsRow>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT division, district, school_type, academic_year,
                  grade_level, result_count, student_count, avg_score,
                  pass_rate, gender_male_count, gender_female_count,
                  gender_male_avg, gender_female_avg, gender_gap,
                  gender_equitable, ses_nonlow_count, ses_low_count,
                  ses_nonlow_avg, ses_low_avg, ses_gap, ses_equitable,
                  disability_without_count, disability_with_count,
                  disability_without_avg, disability_with_avg,
                  disability_gap, disability_equitable,
                  location_urban_count, location_rural_count,
                  location_urban_avg, location_rural_avg, location_gap,
                  location_equitable
           FROM mart_equity_metrics
           ORDER BY academic_year, division, district, school_type,
                    grade_level",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawEquityMetrics {
              division:      r.get(0)?,
              district:      r.get(1)?,
              school_type:   r.get(2)?,
              academic_year: r.get(3)?,
              grade_level:   r.get(4)?,
              result_count:  r.get(5)?,
              student_count: r.get(6)?,
              avg_score:     r.get(7)?,
              pass_rate:     r.get(8)?,
              gender:        RawGapStats {
                advantaged_count:    r.get(9)?,
                disadvantaged_count: r.get(10)?,
                advantaged_avg:      r.get(11)?,
                disadvantaged_avg:   r.get(12)?,
                gap:                 r.get(13)?,
                is_equitable:        r.get(14)?,
              },
              socioeconomic: RawGapStats {
                advantaged_count:    r.get(15)?,
                disadvantaged_count: r.get(16)?,
                advantaged_avg:      r.get(17)?,
                disadvantaged_avg:   r.get(18)?,
                gap:                 r.get(19)?,
                is_equitable:        r.get(20)?,
              },
              disability:    RawGapStats {
                advantaged_count:    r.get(21)?,
                disadvantaged_count: r.get(22)?,
                advantaged_avg:      r.get(23)?,
                disadvantaged_avg:   r.get(24)?,
                gap:                 r.get(25)?,
                is_equitable:        r.get(26)?,
              },
              location:      RawGapStats {
                advantaged_count:    r.get(27)?,
                disadvantaged_count: r.get(28)?,
                advantaged_avg:      r.get(29)?,
                disadvantaged_avg:   r.get(30)?,
                gap:                 r.get(31)?,
                is_equitable:        r.get(32)?,
              },
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawEquityMetrics::into_row).collect()
  }

  // ── Run log ───────────────────────────────────────────────────────────

  async fn record_run(&self, record: RunRecord) -> Result<()> {
    let report_json = record
      .report
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let run_id = encode_uuid(record.run_id);
    let stage = record.stage.as_str();
    let window_from = record.window.map(|w| w.from.label());
    let window_to = record.window.map(|w| w.to.label());
    let started_at = encode_dt(record.started_at);
    let finished_at = record.finished_at.map(encode_dt);
    let status = record.status.as_str();
    let watermark = record.source_watermark.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO run_log (
             run_id, stage, window_from, window_to, started_at,
             finished_at, status, source_watermark, report_json
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            run_id,
            stage,
            window_from,
            window_to,
            started_at,
            finished_at,
            status,
            watermark,
            report_json,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn runs(&self, stage: Option<Stage>) -> Result<Vec<RunRecord>> {
    let stage = stage.map(|s| s.as_str().to_owned());
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT run_id, stage, window_from, window_to, started_at,
                  finished_at, status, source_watermark, report_json
           FROM run_log
           WHERE ?1 IS NULL OR stage = ?1
           ORDER BY started_at DESC, run_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![stage], |r| {
            Ok(RawRunRecord {
              run_id:           r.get(0)?,
              stage:            r.get(1)?,
              window_from:      r.get(2)?,
              window_to:        r.get(3)?,
              started_at:       r.get(4)?,
              finished_at:      r.get(5)?,
              status:           r.get(6)?,
              source_watermark: r.get(7)?,
              report_json:      r.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRunRecord::into_record).collect()
  }

  async fn row_counts(&self) -> Result<Vec<(String, i64)>> {
    let counts = self
      .conn
      .call(|conn| {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
          let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table}"),
            [],
            |r| r.get(0),
          )?;
          counts.push((table.to_owned(), count));
        }
        Ok(counts)
      })
      .await?;
    Ok(counts)
  }
}
