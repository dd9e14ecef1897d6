//! The fact stage: staged events become monthly-partitioned fact rows.
//!
//! Every staged event is deduplicated last-write-wins over the full history,
//! so reloading a window also unloads events whose corrected business date
//! has left it. Dimension references resolve point-in-time against the
//! version chains, and each partition in the window is replaced whole, even
//! when it ends up empty.
//!
//! Rows that cannot be loaded are counted, never fatal: a business date
//! outside the window, an unresolvable student or school, or measures that
//! cannot produce a score each reject the one row.

use std::collections::{BTreeMap, HashSet, btree_map::Entry};

use chrono::NaiveDate;
use shikkha_core::{
  calendar::{self, LoadWindow, Term, YearMonth},
  dimension::{DimGeographyRow, DimSchoolRow, DimStudentRow, DimTeacherRow, DimTimeRow},
  fact::{AssessmentFactRow, AttendanceFactRow, EnrollmentFactRow, FactRow},
  grading::{self, GradeLetter, PerformanceBand},
  keys,
  normalize::{self, AttendanceStatus, EnrollmentStatus},
  report::{QualityWarning, RejectReason, RunReport},
  source::{
    AssessmentRecord, AttendanceRecord, EnrollmentRecord, SourceRecord, Staged,
  },
  store::{FactPartition, Warehouse},
};

use crate::{Error, Result, pit::PitIndex};

/// Run the fact stage over one load window.
pub async fn run<W>(warehouse: &W, window: LoadWindow) -> Result<RunReport>
where
  W: Warehouse,
{
  // Calendar coverage for every date the window can produce.
  warehouse
    .upsert_time(DimTimeRow::generate(&window))
    .await
    .map_err(Error::store)?;

  let student_versions =
    warehouse.student_versions().await.map_err(Error::store)?;
  let teacher_versions =
    warehouse.teacher_versions().await.map_err(Error::store)?;
  let school_versions =
    warehouse.school_versions().await.map_err(Error::store)?;
  let geographies = warehouse.geographies().await.map_err(Error::store)?;

  let context = ResolveContext {
    window,
    students: PitIndex::new(&student_versions),
    teachers: PitIndex::new(&teacher_versions),
    schools: PitIndex::new(&school_versions),
    geographies: geographies.iter().map(|g| g.surrogate_key.as_str()).collect(),
  };

  let mut report = RunReport::default();

  let staged = warehouse.staged_enrollments().await.map_err(Error::store)?;
  let partitions = build_enrollments(staged, &context, &mut report);
  report.emitted += warehouse
    .replace_enrollment_partitions(partitions)
    .await
    .map_err(Error::store)?;

  let staged = warehouse.staged_attendances().await.map_err(Error::store)?;
  let partitions = build_attendances(staged, &context, &mut report);
  report.emitted += warehouse
    .replace_attendance_partitions(partitions)
    .await
    .map_err(Error::store)?;

  let staged = warehouse.staged_assessments().await.map_err(Error::store)?;
  let partitions = build_assessments(staged, &context, &mut report);
  report.emitted += warehouse
    .replace_assessment_partitions(partitions)
    .await
    .map_err(Error::store)?;

  Ok(report)
}

// ─── Dimension resolution ────────────────────────────────────────────────────

struct ResolveContext<'a> {
  window:      LoadWindow,
  students:    PitIndex<'a, DimStudentRow>,
  teachers:    PitIndex<'a, DimTeacherRow>,
  schools:     PitIndex<'a, DimSchoolRow>,
  geographies: HashSet<&'a str>,
}

struct FactRefs {
  student_sk:   String,
  school_sk:    String,
  geography_sk: String,
}

impl ResolveContext<'_> {
  /// The student and school references every fact shape carries, plus the
  /// geography the student's location resolved to. `None` when any of them
  /// cannot be pinned to a version effective at `date`.
  fn resolve_refs(
    &self,
    student_id: &str,
    school_id: &str,
    date: NaiveDate,
  ) -> Option<FactRefs> {
    let student_key = normalize::clean_key(student_id)?;
    let student = self.students.resolve(&student_key, date)?;
    let school_key = normalize::clean_key(school_id)?;
    let school = self.schools.resolve(&school_key, date)?;

    let geography = DimGeographyRow::conform(
      Some(&student.division),
      Some(&student.district),
      Some(&student.upazila),
    );
    if !self.geographies.contains(geography.surrogate_key.as_str()) {
      return None;
    }

    Some(FactRefs {
      student_sk:   student.surrogate_key.clone(),
      school_sk:    school.surrogate_key.clone(),
      geography_sk: geography.surrogate_key,
    })
  }

  /// Teacher references are optional: an unresolvable teacher degrades to
  /// a null reference with a warning rather than rejecting the row.
  fn resolve_teacher(
    &self,
    teacher_id: Option<&str>,
    date: NaiveDate,
    report: &mut RunReport,
  ) -> Option<String> {
    let teacher_key = teacher_id.and_then(normalize::clean_key)?;
    match self.teachers.resolve(&teacher_key, date) {
      Some(teacher) => Some(teacher.surrogate_key.clone()),
      None => {
        report.warn(QualityWarning::UnresolvedTeacher);
        None
      }
    }
  }
}

// ─── Event deduplication ─────────────────────────────────────────────────────

/// Keep the latest staged version of each event, by `(updated_at,
/// source_seq)`. Returns winners keyed by their cleaned business key.
fn dedup_events<T: SourceRecord>(
  staged: Vec<Staged<T>>,
  report: &mut RunReport,
) -> Vec<(String, T)> {
  report.processed += staged.len() as u64;

  let mut winners: BTreeMap<String, Staged<T>> = BTreeMap::new();
  for record in staged {
    let Some(key) = normalize::clean_key(record.row.business_key()) else {
      report.reject(RejectReason::MissingBusinessKey);
      continue;
    };
    match winners.entry(key) {
      Entry::Vacant(slot) => {
        slot.insert(record);
      }
      Entry::Occupied(mut slot) => {
        let held = slot.get();
        if (record.row.updated_at(), record.source_seq)
          > (held.row.updated_at(), held.source_seq)
        {
          slot.insert(record);
        }
        report.superseded += 1;
      }
    }
  }
  winners.into_iter().map(|(key, staged)| (key, staged.row)).collect()
}

/// Every partition in the window starts present, so a window month with no
/// surviving rows is still replaced, and thereby emptied.
fn empty_partitions<R>(window: LoadWindow) -> BTreeMap<YearMonth, Vec<R>> {
  window.partitions().into_iter().map(|month| (month, Vec::new())).collect()
}

// ─── Per-entity builders ─────────────────────────────────────────────────────

fn build_enrollments(
  staged: Vec<Staged<EnrollmentRecord>>,
  context: &ResolveContext<'_>,
  report: &mut RunReport,
) -> Vec<FactPartition<EnrollmentFactRow>> {
  let mut partitions = empty_partitions(context.window);
  for (key, row) in dedup_events(staged, report) {
    let date = row.enrollment_date;
    if !context.window.contains(date) {
      report.reject(RejectReason::OutOfWindow);
      continue;
    }
    let Some(refs) = context.resolve_refs(&row.student_id, &row.school_id, date)
    else {
      report.reject(RejectReason::UnknownDimension);
      continue;
    };
    let status = conform_enrollment_status(row.status.as_deref(), report);

    let fact = EnrollmentFactRow {
      surrogate_key:  keys::surrogate_key(
        keys::tag::FACT_ENROLLMENT,
        &key,
        row.updated_at,
      ),
      enrollment_id:  key,
      student_sk:     refs.student_sk,
      school_sk:      refs.school_sk,
      geography_sk:   refs.geography_sk,
      date_key:       date,
      academic_year:  row.academic_year.trim().to_owned(),
      grade_level:    normalize::clean_text(&row.grade_level)
        .unwrap_or_else(|| "Unknown".to_owned()),
      section:        row.section.as_deref().and_then(normalize::clean_text),
      status,
      is_active:      status.is_active(),
      is_dropout:     status.is_dropout(),
      dropout_reason: row
        .dropout_reason
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned),
      updated_at:     row.updated_at,
    };
    partitions.entry(fact.partition()).or_default().push(fact);
  }
  partitions.into_iter().collect()
}

fn build_attendances(
  staged: Vec<Staged<AttendanceRecord>>,
  context: &ResolveContext<'_>,
  report: &mut RunReport,
) -> Vec<FactPartition<AttendanceFactRow>> {
  let mut partitions = empty_partitions(context.window);
  for (key, row) in dedup_events(staged, report) {
    let date = row.attendance_date;
    if !context.window.contains(date) {
      report.reject(RejectReason::OutOfWindow);
      continue;
    }
    let Some(refs) = context.resolve_refs(&row.student_id, &row.school_id, date)
    else {
      report.reject(RejectReason::UnknownDimension);
      continue;
    };
    let status = conform_attendance_status(row.status.as_deref(), report);

    let fact = AttendanceFactRow {
      surrogate_key:      keys::surrogate_key(
        keys::tag::FACT_ATTENDANCE,
        &key,
        row.updated_at,
      ),
      attendance_id:      key,
      student_sk:         refs.student_sk,
      school_sk:          refs.school_sk,
      geography_sk:       refs.geography_sk,
      date_key:           date,
      academic_year:      calendar::academic_year(date),
      status,
      is_present:         status.counts_as_present(),
      counts_toward_rate: status.counts_toward_rate(),
      period:             row.period,
      updated_at:         row.updated_at,
    };
    partitions.entry(fact.partition()).or_default().push(fact);
  }
  partitions.into_iter().collect()
}

fn build_assessments(
  staged: Vec<Staged<AssessmentRecord>>,
  context: &ResolveContext<'_>,
  report: &mut RunReport,
) -> Vec<FactPartition<AssessmentFactRow>> {
  let mut partitions = empty_partitions(context.window);
  for (key, row) in dedup_events(staged, report) {
    let date = row.assessment_date;
    if !context.window.contains(date) {
      report.reject(RejectReason::OutOfWindow);
      continue;
    }
    let Some(refs) = context.resolve_refs(&row.student_id, &row.school_id, date)
    else {
      report.reject(RejectReason::UnknownDimension);
      continue;
    };
    let Some(percentage) =
      grading::percentage(row.marks_obtained, row.max_marks)
    else {
      report.reject(RejectReason::InvalidMeasure);
      continue;
    };
    let teacher_sk =
      context.resolve_teacher(row.teacher_id.as_deref(), date, report);
    let term = conform_term(row.term.as_deref(), report);

    let fact = AssessmentFactRow {
      surrogate_key:    keys::surrogate_key(
        keys::tag::FACT_ASSESSMENT,
        &key,
        row.updated_at,
      ),
      result_id:        key,
      student_sk:       refs.student_sk,
      school_sk:        refs.school_sk,
      teacher_sk,
      geography_sk:     refs.geography_sk,
      date_key:         date,
      academic_year:    row.academic_year.trim().to_owned(),
      term,
      subject:          normalize::clean_text(&row.subject)
        .unwrap_or_else(|| "Unknown".to_owned()),
      assessment_type:  row
        .assessment_type
        .as_deref()
        .and_then(normalize::clean_text),
      grade_level:      row.grade_level.as_deref().and_then(normalize::clean_text),
      marks_obtained:   row.marks_obtained,
      max_marks:        row.max_marks,
      percentage,
      normalized_score: grading::normalized_score(percentage),
      grade_letter:     GradeLetter::from_percentage(percentage),
      is_pass:          grading::is_pass(percentage),
      performance_band: PerformanceBand::from_percentage(percentage),
      updated_at:       row.updated_at,
    };
    partitions.entry(fact.partition()).or_default().push(fact);
  }
  partitions.into_iter().collect()
}

// ─── Attribute conforming ────────────────────────────────────────────────────

fn conform_enrollment_status(
  raw: Option<&str>,
  report: &mut RunReport,
) -> EnrollmentStatus {
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return EnrollmentStatus::Unknown;
  };
  match EnrollmentStatus::parse(value) {
    Some(status) => status,
    None => {
      report.warn(QualityWarning::UnrecognizedEnrollmentStatus);
      EnrollmentStatus::Unknown
    }
  }
}

fn conform_attendance_status(
  raw: Option<&str>,
  report: &mut RunReport,
) -> AttendanceStatus {
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return AttendanceStatus::Unknown;
  };
  match AttendanceStatus::parse(value) {
    Some(status) => status,
    None => {
      report.warn(QualityWarning::UnrecognizedAttendanceStatus);
      AttendanceStatus::Unknown
    }
  }
}

fn conform_term(raw: Option<&str>, report: &mut RunReport) -> Option<String> {
  let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
  match Term::parse(value) {
    Some(term) => Some(term.as_str().to_owned()),
    None => {
      report.warn(QualityWarning::UnrecognizedTerm);
      None
    }
  }
}
