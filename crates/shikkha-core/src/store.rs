//! The `Warehouse` trait — the storage seam of the pipeline.
//!
//! The trait is implemented by storage backends (e.g.
//! `shikkha-store-sqlite`). The transform layer (`shikkha-elt`) and the CLI
//! depend on this abstraction, not on any concrete backend.
//!
//! Writes are shaped by layer: raw appends are unconditional, dimension
//! version appends are idempotent (re-inserting an existing version is a
//! no-op), fact writes replace whole monthly partitions atomically, and
//! mart writes replace the whole table.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  calendar::YearMonth,
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
};

/// One monthly partition of fact rows, keyed by partition month.
pub type FactPartition<R> = (YearMonth, Vec<R>);

/// Abstraction over a warehouse storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Raw layer — appends ───────────────────────────────────────────────

  /// Append raw student records; returns the number written. The store
  /// assigns each row a monotonically increasing `source_seq`.
  fn append_students(
    &self,
    rows: Vec<StudentRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_teachers(
    &self,
    rows: Vec<TeacherRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_schools(
    &self,
    rows: Vec<SchoolRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_enrollments(
    &self,
    rows: Vec<EnrollmentRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_attendances(
    &self,
    rows: Vec<AttendanceRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_assessments(
    &self,
    rows: Vec<AssessmentRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Staging layer — reads ─────────────────────────────────────────────

  /// Staged student records, ordered by `source_seq`. With `since`, only
  /// rows whose `updated_at` is strictly later are returned.
  fn staged_students(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Staged<StudentRecord>>, Self::Error>>
  + Send
  + '_;

  fn staged_teachers(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Staged<TeacherRecord>>, Self::Error>>
  + Send
  + '_;

  fn staged_schools(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Staged<SchoolRecord>>, Self::Error>>
  + Send
  + '_;

  /// All staged enrollment events, ordered by `source_seq`. Fact builds
  /// deduplicate over the full history so that an update moving an event
  /// to another month also removes it from the month it left.
  fn staged_enrollments(
    &self,
  ) -> impl Future<Output = Result<Vec<Staged<EnrollmentRecord>>, Self::Error>>
  + Send
  + '_;

  fn staged_attendances(
    &self,
  ) -> impl Future<Output = Result<Vec<Staged<AttendanceRecord>>, Self::Error>>
  + Send
  + '_;

  fn staged_assessments(
    &self,
  ) -> impl Future<Output = Result<Vec<Staged<AssessmentRecord>>, Self::Error>>
  + Send
  + '_;

  /// Latest `updated_at` among staged rows of the dimension-shaped
  /// entities (students, teachers, schools) at or before `until`.
  fn staged_dim_high_water(
    &self,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>>
  + Send
  + '_;

  // ── Dimensions ────────────────────────────────────────────────────────

  /// Append student versions. Re-inserting an already-present version is
  /// a no-op, so reloads are idempotent. Returns the number offered, not
  /// the number newly written.
  fn append_student_versions(
    &self,
    rows: Vec<DimStudentRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_teacher_versions(
    &self,
    rows: Vec<DimTeacherRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn append_school_versions(
    &self,
    rows: Vec<DimSchoolRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All student versions with their computed validity intervals, ordered
  /// by business key then `effective_from`.
  fn student_versions(
    &self,
  ) -> impl Future<Output = Result<Vec<DimStudentRow>, Self::Error>> + Send + '_;

  fn teacher_versions(
    &self,
  ) -> impl Future<Output = Result<Vec<DimTeacherRow>, Self::Error>> + Send + '_;

  fn school_versions(
    &self,
  ) -> impl Future<Output = Result<Vec<DimSchoolRow>, Self::Error>> + Send + '_;

  /// Insert geography rows not yet present; existing keys are untouched.
  fn upsert_geographies(
    &self,
    rows: Vec<DimGeographyRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn geographies(
    &self,
  ) -> impl Future<Output = Result<Vec<DimGeographyRow>, Self::Error>>
  + Send
  + '_;

  /// Upsert calendar days keyed by date. Day attributes are generated and
  /// deterministic, so replacing an existing day is harmless.
  fn upsert_time(
    &self,
    rows: Vec<DimTimeRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn time_days(
    &self,
  ) -> impl Future<Output = Result<Vec<DimTimeRow>, Self::Error>> + Send + '_;

  // ── Facts — partition replacement ─────────────────────────────────────

  /// Replace the given monthly partitions of the enrollment fact table.
  /// Each partition is swapped in its own transaction: delete the month,
  /// insert its new rows, commit.
  fn replace_enrollment_partitions(
    &self,
    partitions: Vec<FactPartition<EnrollmentFactRow>>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn replace_attendance_partitions(
    &self,
    partitions: Vec<FactPartition<AttendanceFactRow>>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn replace_assessment_partitions(
    &self,
    partitions: Vec<FactPartition<AssessmentFactRow>>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn enrollment_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<EnrollmentFactRow>, Self::Error>>
  + Send
  + '_;

  fn attendance_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<AttendanceFactRow>, Self::Error>>
  + Send
  + '_;

  fn assessment_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<AssessmentFactRow>, Self::Error>>
  + Send
  + '_;

  // ── Marts — full refresh ──────────────────────────────────────────────

  fn replace_student_performance(
    &self,
    rows: Vec<StudentPerformanceRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn replace_equity_metrics(
    &self,
    rows: Vec<EquityMetricsRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn student_performance(
    &self,
  ) -> impl Future<Output = Result<Vec<StudentPerformanceRow>, Self::Error>>
  + Send
  + '_;

  fn equity_metrics(
    &self,
  ) -> impl Future<Output = Result<Vec<EquityMetricsRow>, Self::Error>>
  + Send
  + '_;

  // ── Run log ───────────────────────────────────────────────────────────

  /// Insert or update a run record, keyed by `run_id`. A stage writes the
  /// record once when it starts and again when it finishes.
  fn record_run(
    &self,
    record: RunRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Run records, newest first, optionally restricted to one stage.
  fn runs(
    &self,
    stage: Option<Stage>,
  ) -> impl Future<Output = Result<Vec<RunRecord>, Self::Error>> + Send + '_;

  /// Row counts of every warehouse table, for operator status output.
  fn row_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<(String, i64)>, Self::Error>>
  + Send
  + '_;
}
