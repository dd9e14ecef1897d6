//! End-to-end pipeline tests over an in-memory SQLite warehouse.
//!
//! Each test drives the public [`Pipeline`] surface the way the CLI does:
//! append raw records, run stages, read the resulting tables back.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use shikkha_core::{
  calendar::{LoadWindow, YearMonth},
  dimension::far_future,
  grading::PerformanceBand,
  normalize::{EnrollmentStatus, SchoolType},
  report::{QualityWarning, RejectReason, RunStatus, Stage},
  source::{
    AssessmentRecord, AttendanceRecord, EnrollmentRecord, SchoolRecord,
    StudentRecord, TeacherRecord,
  },
  store::Warehouse,
};
use shikkha_store_sqlite::SqliteWarehouse;

use crate::{Error, Pipeline};

async fn pipeline() -> Pipeline<SqliteWarehouse> {
  let warehouse = SqliteWarehouse::open_in_memory()
    .await
    .expect("in-memory warehouse opens");
  Pipeline::new(warehouse)
}

fn dt(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
}

fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, mo, d).unwrap()
}

fn month(label: &str) -> LoadWindow {
  LoadWindow::single(YearMonth::parse(label).unwrap())
}

fn span(from: &str, to: &str) -> LoadWindow {
  LoadWindow::new(
    YearMonth::parse(from).unwrap(),
    YearMonth::parse(to).unwrap(),
  )
  .unwrap()
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn student(id: &str, updated_at: DateTime<Utc>) -> StudentRecord {
  StudentRecord {
    student_id:           id.into(),
    full_name:            "rahima khatun".into(),
    gender:               Some("F".into()),
    date_of_birth:        NaiveDate::from_ymd_opt(2012, 4, 15),
    division:             Some("Dhaka".into()),
    district:             Some("Dhaka".into()),
    upazila:              Some("Savar".into()),
    socioeconomic_status: Some("middle".into()),
    disability_status:    Some("none".into()),
    guardian_contact:     None,
    updated_at,
  }
}

fn school(id: &str, updated_at: DateTime<Utc>) -> SchoolRecord {
  SchoolRecord {
    school_id:       id.into(),
    school_name:     "savar model school".into(),
    school_type:     Some("government".into()),
    education_level: Some("secondary".into()),
    division:        Some("Dhaka".into()),
    district:        Some("Dhaka".into()),
    upazila:         Some("Savar".into()),
    geo_location:    None,
    updated_at,
  }
}

fn teacher(id: &str, updated_at: DateTime<Utc>) -> TeacherRecord {
  TeacherRecord {
    teacher_id:        id.into(),
    full_name:         "farid ahmed".into(),
    gender:            Some("M".into()),
    school_id:         Some("SCH-1".into()),
    subject_specialty: Some("mathematics".into()),
    qualification:     Some("B.Ed".into()),
    hire_date:         NaiveDate::from_ymd_opt(2015, 1, 10),
    updated_at,
  }
}

fn enrollment(
  id: &str,
  day: NaiveDate,
  updated_at: DateTime<Utc>,
) -> EnrollmentRecord {
  EnrollmentRecord {
    enrollment_id:   id.into(),
    student_id:      "STU-1".into(),
    school_id:       "SCH-1".into(),
    academic_year:   "2024".into(),
    grade_level:     "Five".into(),
    section:         None,
    status:          Some("active".into()),
    enrollment_date: day,
    dropout_reason:  None,
    updated_at,
  }
}

fn attendance(
  id: &str,
  day: NaiveDate,
  status: &str,
  updated_at: DateTime<Utc>,
) -> AttendanceRecord {
  AttendanceRecord {
    attendance_id:   id.into(),
    student_id:      "STU-1".into(),
    school_id:       "SCH-1".into(),
    attendance_date: day,
    status:          Some(status.into()),
    period:          None,
    remarks:         None,
    updated_at,
  }
}

fn assessment(
  id: &str,
  day: NaiveDate,
  marks: f64,
  updated_at: DateTime<Utc>,
) -> AssessmentRecord {
  AssessmentRecord {
    result_id:       id.into(),
    student_id:      "STU-1".into(),
    school_id:       "SCH-1".into(),
    teacher_id:      None,
    subject:         "mathematics".into(),
    assessment_type: Some("term exam".into()),
    grade_level:     Some("Five".into()),
    academic_year:   "2024".into(),
    term:            Some("first".into()),
    assessment_date: day,
    marks_obtained:  marks,
    max_marks:       100.0,
    updated_at,
  }
}

/// One student and one school, applied to the dimensions.
async fn seed_entities(pipeline: &Pipeline<SqliteWarehouse>) {
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse
    .append_schools(vec![school("SCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  pipeline.run_dimensions(false).await.unwrap();
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_load_builds_single_current_versions() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![
      student("STU-1", dt(2024, 1, 1, 6)),
      student("STU-2", dt(2024, 1, 1, 7)),
    ])
    .await
    .unwrap();
  warehouse
    .append_schools(vec![school("SCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();

  let record = pipeline.run_dimensions(false).await.unwrap();
  assert_eq!(record.status, RunStatus::Succeeded);
  assert_eq!(record.source_watermark, Some(dt(2024, 1, 1, 7)));

  let students = warehouse.student_versions().await.unwrap();
  assert_eq!(students.len(), 2);
  assert!(students.iter().all(|v| v.is_current));
  assert!(students.iter().all(|v| v.effective_to == far_future()));
  assert_eq!(students[0].full_name, "Rahima Khatun");

  // Students and the school share one conformed location; the unknown
  // triple is always seeded beside it.
  assert_eq!(warehouse.geographies().await.unwrap().len(), 2);
  // Two student versions, one school version, two geographies.
  assert_eq!(record.report.unwrap().emitted, 5);
}

#[tokio::test]
async fn attribute_change_opens_a_new_version() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  pipeline.run_dimensions(false).await.unwrap();

  // The student moves; only the new row arrives in the incremental run.
  let mut moved = student("STU-1", dt(2024, 6, 1, 0));
  moved.division = Some("Sylhet".into());
  moved.district = Some("Sylhet".into());
  moved.upazila = Some("Beanibazar".into());
  warehouse.append_students(vec![moved]).await.unwrap();
  let record = pipeline.run_dimensions(false).await.unwrap();
  assert_eq!(record.source_watermark, Some(dt(2024, 6, 1, 0)));

  let versions = warehouse.student_versions().await.unwrap();
  assert_eq!(versions.len(), 2);
  let (first, second) = (&versions[0], &versions[1]);
  assert_eq!(first.district, "Dhaka");
  assert!(!first.is_current);
  // Intervals abut: the old version closes exactly where the new one opens.
  assert_eq!(first.effective_to, second.effective_from);
  assert_eq!(second.district, "Sylhet");
  assert!(second.is_current);
  assert_eq!(second.effective_to, far_future());
}

#[tokio::test]
async fn unchanged_resubmission_adds_no_version() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  pipeline.run_dimensions(false).await.unwrap();

  warehouse
    .append_students(vec![student("STU-1", dt(2024, 3, 1, 0))])
    .await
    .unwrap();
  let record = pipeline.run_dimensions(false).await.unwrap();

  let report = record.report.unwrap();
  assert_eq!(report.emitted, 0);
  assert_eq!(report.total_rejected(), 0);
  assert_eq!(warehouse.student_versions().await.unwrap().len(), 1);
  // The watermark still advances past the no-op update.
  assert_eq!(record.source_watermark, Some(dt(2024, 3, 1, 0)));
}

#[tokio::test]
async fn full_replay_converges_without_new_versions() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  pipeline.run_dimensions(false).await.unwrap();
  let mut moved = student("STU-1", dt(2024, 6, 1, 0));
  moved.district = Some("Gazipur".into());
  warehouse.append_students(vec![moved]).await.unwrap();
  pipeline.run_dimensions(false).await.unwrap();

  let before = warehouse.student_versions().await.unwrap();
  let record = pipeline.run_dimensions(true).await.unwrap();
  let after = warehouse.student_versions().await.unwrap();

  // The replay sees the whole history again; everything at or before the
  // committed chain head is stale, so the chains do not move.
  assert_eq!(before, after);
  assert_eq!(after.len(), 2);
  let report = record.report.unwrap();
  assert_eq!(report.emitted, 0);
  assert_eq!(report.rejected_for(RejectReason::StaleUpdate), 2);
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn facts_join_point_in_time_versions() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse
    .append_schools(vec![school("SCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  pipeline.run_dimensions(false).await.unwrap();

  let mut moved = student("STU-1", dt(2024, 6, 1, 0));
  moved.division = Some("Sylhet".into());
  moved.district = Some("Sylhet".into());
  moved.upazila = Some("Beanibazar".into());
  warehouse.append_students(vec![moved]).await.unwrap();
  pipeline.run_dimensions(false).await.unwrap();

  warehouse
    .append_assessments(vec![
      assessment("RES-MAY", date(2024, 5, 31), 80.0, dt(2024, 5, 31, 18)),
      assessment("RES-JUN", date(2024, 6, 1), 80.0, dt(2024, 6, 1, 18)),
    ])
    .await
    .unwrap();
  pipeline.run_facts(span("2024-05", "2024-06")).await.unwrap();

  let versions = warehouse.student_versions().await.unwrap();
  let facts = warehouse.assessment_facts().await.unwrap();
  assert_eq!(facts.len(), 2);
  let by_id =
    |id: &str| facts.iter().find(|f| f.result_id == id).expect("fact loaded");

  // May's result stays pinned to the Dhaka-era version; June 1 falls on the
  // new version's first effective day.
  assert_eq!(by_id("RES-MAY").student_sk, versions[0].surrogate_key);
  assert_eq!(by_id("RES-JUN").student_sk, versions[1].surrogate_key);

  let geographies = warehouse.geographies().await.unwrap();
  let district = |sk: &str| {
    geographies
      .iter()
      .find(|g| g.surrogate_key == sk)
      .expect("geography resolved")
      .district
      .clone()
  };
  assert_eq!(district(&by_id("RES-MAY").geography_sk), "Dhaka");
  assert_eq!(district(&by_id("RES-JUN").geography_sk), "Sylhet");
}

#[tokio::test]
async fn fact_reload_is_byte_identical() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_attendances(vec![
      attendance("ATT-1", date(2024, 3, 5), "present", dt(2024, 3, 5, 18)),
      attendance("ATT-2", date(2024, 3, 6), "absent", dt(2024, 3, 6, 18)),
    ])
    .await
    .unwrap();

  pipeline.run_facts(month("2024-03")).await.unwrap();
  let first = warehouse.attendance_facts().await.unwrap();
  pipeline.run_facts(month("2024-03")).await.unwrap();
  let second = warehouse.attendance_facts().await.unwrap();

  assert_eq!(first.len(), 2);
  assert_eq!(first, second);
  // The calendar dimension covers every day of the window.
  assert_eq!(warehouse.time_days().await.unwrap().len(), 31);
}

#[tokio::test]
async fn corrected_events_leave_their_old_partition() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await;
  let warehouse = pipeline.warehouse();

  warehouse
    .append_attendances(vec![attendance(
      "ATT-1",
      date(2024, 3, 31),
      "present",
      dt(2024, 3, 31, 18),
    )])
    .await
    .unwrap();
  pipeline.run_facts(month("2024-03")).await.unwrap();
  assert_eq!(warehouse.attendance_facts().await.unwrap().len(), 1);

  // The mark was keyed to the wrong day; the correction moves it to April.
  warehouse
    .append_attendances(vec![attendance(
      "ATT-1",
      date(2024, 4, 1),
      "present",
      dt(2024, 4, 2, 9),
    )])
    .await
    .unwrap();
  let record = pipeline.run_facts(span("2024-03", "2024-04")).await.unwrap();

  let facts = warehouse.attendance_facts().await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].date_key, date(2024, 4, 1));
  assert_eq!(record.report.unwrap().superseded, 1);
}

#[tokio::test]
async fn events_outside_the_window_are_counted_not_loaded() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_attendances(vec![
      attendance("ATT-1", date(2024, 3, 5), "present", dt(2024, 3, 5, 18)),
      attendance("ATT-2", date(2024, 2, 20), "present", dt(2024, 2, 20, 18)),
    ])
    .await
    .unwrap();

  let record = pipeline.run_facts(month("2024-03")).await.unwrap();

  assert_eq!(
    record.report.unwrap().rejected_for(RejectReason::OutOfWindow),
    1
  );
  let facts = warehouse.attendance_facts().await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].attendance_id, "ATT-1");
}

#[tokio::test]
async fn facts_before_any_version_reject_as_unknown() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await; // versions take effect 2024-01-01T06:00
  let warehouse = pipeline.warehouse();
  warehouse
    .append_assessments(vec![assessment(
      "RES-0",
      date(2023, 12, 15),
      40.0,
      dt(2023, 12, 16, 9),
    )])
    .await
    .unwrap();

  let record = pipeline.run_facts(month("2023-12")).await.unwrap();

  assert_eq!(
    record.report.unwrap().rejected_for(RejectReason::UnknownDimension),
    1
  );
  assert!(warehouse.assessment_facts().await.unwrap().is_empty());
}

#[tokio::test]
async fn enrollment_facts_carry_status_flags() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await;
  let warehouse = pipeline.warehouse();
  let active = enrollment("ENR-1", date(2024, 1, 10), dt(2024, 1, 10, 9));
  let mut dropped = enrollment("ENR-2", date(2024, 1, 20), dt(2024, 1, 20, 9));
  dropped.status = Some("dropped out".into());
  dropped.dropout_reason = Some("family migration".into());
  warehouse.append_enrollments(vec![active, dropped]).await.unwrap();

  pipeline.run_facts(month("2024-01")).await.unwrap();

  let facts = warehouse.enrollment_facts().await.unwrap();
  assert_eq!(facts.len(), 2);
  let by_id = |id: &str| facts.iter().find(|f| f.enrollment_id == id).unwrap();
  assert!(by_id("ENR-1").is_active);
  assert!(!by_id("ENR-1").is_dropout);
  let dropout = by_id("ENR-2");
  assert_eq!(dropout.status, EnrollmentStatus::Dropped);
  assert!(dropout.is_dropout);
  assert_eq!(dropout.dropout_reason.as_deref(), Some("family migration"));
}

#[tokio::test]
async fn teacher_references_resolve_or_degrade_to_null() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse
    .append_schools(vec![school("SCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse
    .append_teachers(vec![teacher("TCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  pipeline.run_dimensions(false).await.unwrap();

  let mut known =
    assessment("RES-1", date(2024, 3, 10), 40.0, dt(2024, 3, 11, 9));
  known.teacher_id = Some("TCH-1".into());
  let mut unknown =
    assessment("RES-2", date(2024, 3, 12), 40.0, dt(2024, 3, 13, 9));
  unknown.teacher_id = Some("TCH-9".into());
  warehouse.append_assessments(vec![known, unknown]).await.unwrap();

  let record = pipeline.run_facts(month("2024-03")).await.unwrap();

  let facts = warehouse.assessment_facts().await.unwrap();
  assert_eq!(facts.len(), 2);
  let by_id = |id: &str| facts.iter().find(|f| f.result_id == id).unwrap();
  assert!(by_id("RES-1").teacher_sk.is_some());
  assert_eq!(by_id("RES-2").teacher_sk, None);
  assert_eq!(
    record.report.unwrap().warned_for(QualityWarning::UnresolvedTeacher),
    1
  );
}

#[tokio::test]
async fn unusable_marks_reject_the_result() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await;
  let warehouse = pipeline.warehouse();
  let mut zero_max =
    assessment("RES-1", date(2024, 3, 10), 10.0, dt(2024, 3, 11, 9));
  zero_max.max_marks = 0.0;
  let mut over =
    assessment("RES-2", date(2024, 3, 10), 60.0, dt(2024, 3, 11, 9));
  over.max_marks = 50.0;
  warehouse.append_assessments(vec![zero_max, over]).await.unwrap();

  let record = pipeline.run_facts(month("2024-03")).await.unwrap();

  assert_eq!(
    record.report.unwrap().rejected_for(RejectReason::InvalidMeasure),
    2
  );
  assert!(warehouse.assessment_facts().await.unwrap().is_empty());
}

// ─── Stage ordering ──────────────────────────────────────────────────────────

#[tokio::test]
async fn facts_refuse_to_run_ahead_of_the_dimension_stage() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();

  let err = pipeline.run_facts(month("2024-03")).await.unwrap_err();
  assert!(matches!(err, Error::StageOrder(_)));
  // A refused run never reaches the run log.
  assert!(warehouse.runs(Some(Stage::Facts)).await.unwrap().is_empty());

  // Applying the staged rows clears the guard.
  pipeline.run_dimensions(false).await.unwrap();
  assert!(pipeline.run_facts(month("2024-03")).await.is_ok());
}

#[tokio::test]
async fn marts_require_a_successful_fact_run_first() {
  let pipeline = pipeline().await;
  let err = pipeline.run_marts().await.unwrap_err();
  assert!(matches!(err, Error::StageOrder(_)));
}

// ─── Marts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn performance_mart_aggregates_scores_and_attendance() {
  let pipeline = pipeline().await;
  seed_entities(&pipeline).await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_assessments(vec![
      assessment("RES-1", date(2024, 3, 10), 85.0, dt(2024, 3, 11, 9)),
      assessment("RES-2", date(2024, 3, 20), 25.0, dt(2024, 3, 21, 9)),
    ])
    .await
    .unwrap();
  warehouse
    .append_attendances(vec![
      attendance("ATT-1", date(2024, 3, 4), "present", dt(2024, 3, 4, 18)),
      attendance("ATT-2", date(2024, 3, 5), "present", dt(2024, 3, 5, 18)),
      attendance("ATT-3", date(2024, 3, 6), "absent", dt(2024, 3, 6, 18)),
      attendance("ATT-4", date(2024, 3, 7), "holiday", dt(2024, 3, 7, 18)),
    ])
    .await
    .unwrap();
  pipeline.run_facts(month("2024-03")).await.unwrap();
  pipeline.run_marts().await.unwrap();

  let rows = warehouse.student_performance().await.unwrap();
  assert_eq!(rows.len(), 1);
  let row = &rows[0];
  assert_eq!(row.student_id, "STU-1");
  assert_eq!(row.student_name, "Rahima Khatun");
  assert_eq!(row.school_name, "Savar Model School");
  assert_eq!(row.academic_year, "2024");
  assert_eq!(row.assessment_count, 2);
  assert_eq!(row.avg_percentage, Some(55.0));
  assert_eq!(row.pass_rate, Some(50.0));
  assert_eq!(row.performance_band, Some(PerformanceBand::NeedsImprovement));
  assert_eq!(row.grades.a_plus, 1);
  assert_eq!(row.grades.f, 1);
  // The holiday never enters the denominator.
  assert_eq!(row.school_days, 3);
  assert_eq!(row.present_days, 2);
  assert_eq!(row.absent_days, 1);
  let rate = row.attendance_rate.expect("attendance was recorded");
  assert!((rate - 200.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn equity_mart_computes_gaps_and_withholds_small_cells() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();

  // Twelve students in Dhaka: six boys scoring 80, six girls scoring 70,
  // the first three boys low-income. Three more students sit in Bogra,
  // too few to publish as a group.
  let mut students = Vec::new();
  let mut results = Vec::new();
  for i in 1..=15 {
    let id = format!("STU-{i:02}");
    let mut record = student(&id, dt(2024, 1, 1, 6));
    if i <= 6 {
      record.gender = Some("M".into());
    }
    if i <= 3 {
      record.socioeconomic_status = Some("low".into());
    }
    if i > 12 {
      record.division = Some("Rajshahi".into());
      record.district = Some("Bogra".into());
      record.upazila = Some("Sadar".into());
    }
    students.push(record);

    let marks = if i <= 6 {
      80.0
    } else if i <= 12 {
      70.0
    } else {
      50.0
    };
    let mut result = assessment(
      &format!("RES-{i:02}"),
      date(2024, 3, 10),
      marks,
      dt(2024, 3, 11, 9),
    );
    result.student_id = id;
    results.push(result);
  }
  warehouse.append_students(students).await.unwrap();
  warehouse
    .append_schools(vec![school("SCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse.append_assessments(results).await.unwrap();

  pipeline.run_dimensions(false).await.unwrap();
  pipeline.run_facts(month("2024-03")).await.unwrap();
  let record = pipeline.run_marts().await.unwrap();

  let rows = warehouse.equity_metrics().await.unwrap();
  assert_eq!(rows.len(), 1);
  let row = &rows[0];
  assert_eq!(row.division, "Dhaka");
  assert_eq!(row.district, "Dhaka");
  assert_eq!(row.school_type, SchoolType::Government);
  assert_eq!(row.academic_year, "2024");
  assert_eq!(row.grade_level, "Five");
  assert_eq!(row.result_count, 12);
  assert_eq!(row.student_count, 12);
  assert_eq!(row.avg_score, 75.0);
  assert_eq!(row.pass_rate, 100.0);

  assert_eq!(row.gender.advantaged_avg, Some(80.0));
  assert_eq!(row.gender.disadvantaged_avg, Some(70.0));
  assert_eq!(row.gender.gap, Some(10.0));
  assert_eq!(row.gender.is_equitable, Some(false));

  // Three low-income students fall under the publication floor: counts
  // stay, the gap is withheld.
  assert_eq!(row.socioeconomic.advantaged_count, 9);
  assert_eq!(row.socioeconomic.disadvantaged_count, 3);
  assert_eq!(row.socioeconomic.gap, None);
  assert_eq!(row.socioeconomic.is_equitable, None);

  // Nobody reported a disability and the school is urban, so those pairs
  // have an empty side: absence, not suppression.
  assert_eq!(row.disability.disadvantaged_count, 0);
  assert_eq!(row.location.disadvantaged_count, 0);

  let report = record.report.unwrap();
  assert_eq!(report.rejected_for(RejectReason::SuppressedGroup), 1);
  assert_eq!(report.rejected_for(RejectReason::SuppressedSubgroup), 1);
}

// ─── Full pipeline ───────────────────────────────────────────────────────────

#[tokio::test]
async fn run_all_logs_one_record_per_stage() {
  let pipeline = pipeline().await;
  let warehouse = pipeline.warehouse();
  warehouse
    .append_students(vec![student("STU-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse
    .append_schools(vec![school("SCH-1", dt(2024, 1, 1, 6))])
    .await
    .unwrap();
  warehouse
    .append_attendances(vec![attendance(
      "ATT-1",
      date(2024, 3, 5),
      "present",
      dt(2024, 3, 5, 18),
    )])
    .await
    .unwrap();

  let records = pipeline.run_all(month("2024-03")).await.unwrap();

  assert_eq!(records.len(), 3);
  assert!(records.iter().all(|r| r.status == RunStatus::Succeeded));
  assert_eq!(records[0].stage, Stage::Dimensions);
  assert_eq!(records[1].stage, Stage::Facts);
  assert_eq!(records[2].stage, Stage::Marts);
  assert_eq!(records[1].window, Some(month("2024-03")));
  for stage in [Stage::Dimensions, Stage::Facts, Stage::Marts] {
    assert_eq!(warehouse.runs(Some(stage)).await.unwrap().len(), 1);
  }
}

#[tokio::test]
async fn an_empty_warehouse_runs_end_to_end() {
  let pipeline = pipeline().await;
  let records = pipeline.run_all(month("2024-03")).await.unwrap();
  assert!(records.iter().all(|r| r.status == RunStatus::Succeeded));
  assert_eq!(records[0].source_watermark, None);
}
