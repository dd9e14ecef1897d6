//! The mart stage: fact tables become published analytical aggregates.
//!
//! Both marts are recomputed whole from the fact tables on every run. Facts
//! carry the surrogate keys their build resolved, so mart joins inherit
//! point-in-time correctness without re-resolving anything: an assessment
//! taken before a student moved districts aggregates under the old district
//! forever.
//!
//! The equity mart withholds small cells rather than publishing them, and
//! counts every withheld group and subgroup pair.

use std::collections::{BTreeMap, HashMap, HashSet};

use shikkha_core::{
  dimension::{DimGeographyRow, DimSchoolRow, DimStudentRow},
  fact::{AssessmentFactRow, AttendanceFactRow},
  grading::PerformanceBand,
  mart::{
    EquityMetricsRow, GapStats, GradeCounts, MIN_CELL_SIZE, ScoreAccumulator,
    StudentPerformanceRow,
  },
  normalize::{Gender, SchoolType, SesTier},
  report::{RejectReason, RunReport},
  store::Warehouse,
};

use crate::{Error, Result};

/// Run the mart stage: recompute both marts from the fact tables.
pub async fn run<W>(warehouse: &W) -> Result<RunReport>
where
  W: Warehouse,
{
  let assessments = warehouse.assessment_facts().await.map_err(Error::store)?;
  let attendances = warehouse.attendance_facts().await.map_err(Error::store)?;
  let student_versions =
    warehouse.student_versions().await.map_err(Error::store)?;
  let school_versions =
    warehouse.school_versions().await.map_err(Error::store)?;
  let geographies = warehouse.geographies().await.map_err(Error::store)?;

  let students_by_sk: HashMap<&str, &DimStudentRow> = student_versions
    .iter()
    .map(|version| (version.surrogate_key.as_str(), version))
    .collect();
  let schools_by_sk: HashMap<&str, &DimSchoolRow> = school_versions
    .iter()
    .map(|version| (version.surrogate_key.as_str(), version))
    .collect();
  let geographies_by_sk: HashMap<&str, &DimGeographyRow> = geographies
    .iter()
    .map(|geo| (geo.surrogate_key.as_str(), geo))
    .collect();
  let current_students: HashMap<&str, &DimStudentRow> = student_versions
    .iter()
    .filter(|version| version.is_current)
    .map(|version| (version.student_id.as_str(), version))
    .collect();
  let current_schools: HashMap<&str, &DimSchoolRow> = school_versions
    .iter()
    .filter(|version| version.is_current)
    .map(|version| (version.school_id.as_str(), version))
    .collect();

  let mut report = RunReport::default();
  report.processed = (assessments.len() + attendances.len()) as u64;

  // Resolve each fact's stored references once; both marts reuse the result.
  let mut resolved_assessments = Vec::with_capacity(assessments.len());
  for fact in &assessments {
    match (
      students_by_sk.get(fact.student_sk.as_str()),
      schools_by_sk.get(fact.school_sk.as_str()),
      geographies_by_sk.get(fact.geography_sk.as_str()),
    ) {
      (Some(&student), Some(&school), Some(&geography)) => {
        resolved_assessments.push(ResolvedAssessment {
          fact,
          student,
          school,
          geography,
        });
      }
      _ => report.reject(RejectReason::UnknownDimension),
    }
  }
  let mut resolved_attendances = Vec::with_capacity(attendances.len());
  for fact in &attendances {
    match (
      students_by_sk.get(fact.student_sk.as_str()),
      schools_by_sk.get(fact.school_sk.as_str()),
    ) {
      (Some(&student), Some(&school)) => {
        resolved_attendances.push(ResolvedAttendance { fact, student, school });
      }
      _ => report.reject(RejectReason::UnknownDimension),
    }
  }

  let equity = build_equity(&resolved_assessments, &mut report);
  let performance = build_performance(
    &resolved_assessments,
    &resolved_attendances,
    &current_students,
    &current_schools,
  );

  let mut emitted = warehouse
    .replace_equity_metrics(equity)
    .await
    .map_err(Error::store)?;
  emitted += warehouse
    .replace_student_performance(performance)
    .await
    .map_err(Error::store)?;
  report.emitted = emitted;

  Ok(report)
}

struct ResolvedAssessment<'a> {
  fact:      &'a AssessmentFactRow,
  student:   &'a DimStudentRow,
  school:    &'a DimSchoolRow,
  geography: &'a DimGeographyRow,
}

struct ResolvedAttendance<'a> {
  fact:    &'a AttendanceFactRow,
  student: &'a DimStudentRow,
  school:  &'a DimSchoolRow,
}

// ─── Equity ──────────────────────────────────────────────────────────────────

type EquityKey = (String, String, SchoolType, String, String);

#[derive(Default)]
struct EquityCell<'a> {
  results:            i64,
  students:           HashSet<&'a str>,
  passed:             i64,
  overall:            ScoreAccumulator,
  male:               ScoreAccumulator,
  female:             ScoreAccumulator,
  non_low_income:     ScoreAccumulator,
  low_income:         ScoreAccumulator,
  without_disability: ScoreAccumulator,
  with_disability:    ScoreAccumulator,
  urban:              ScoreAccumulator,
  rural:              ScoreAccumulator,
}

fn build_equity<'a>(
  assessments: &[ResolvedAssessment<'a>],
  report: &mut RunReport,
) -> Vec<EquityMetricsRow> {
  let mut cells: BTreeMap<EquityKey, EquityCell<'a>> = BTreeMap::new();

  for resolved in assessments {
    let fact = resolved.fact;
    let key = (
      resolved.geography.division.clone(),
      resolved.geography.district.clone(),
      resolved.school.school_type,
      fact.academic_year.clone(),
      fact
        .grade_level
        .clone()
        .unwrap_or_else(|| "Unknown".to_owned()),
    );
    let cell = cells.entry(key).or_default();
    cell.results += 1;
    cell.students.insert(resolved.student.student_id.as_str());
    if fact.is_pass {
      cell.passed += 1;
    }
    cell.overall.push(fact.percentage);

    match resolved.student.gender {
      Gender::Male => cell.male.push(fact.percentage),
      Gender::Female => cell.female.push(fact.percentage),
      Gender::Other | Gender::Unknown => {}
    }
    match resolved.student.socioeconomic_tier {
      SesTier::Low => cell.low_income.push(fact.percentage),
      SesTier::Middle | SesTier::High => {
        cell.non_low_income.push(fact.percentage)
      }
      SesTier::Unknown => {}
    }
    match resolved.student.has_disability {
      Some(true) => cell.with_disability.push(fact.percentage),
      Some(false) => cell.without_disability.push(fact.percentage),
      None => {}
    }
    if resolved.school.is_rural {
      cell.rural.push(fact.percentage);
    } else {
      cell.urban.push(fact.percentage);
    }
  }

  let mut rows = Vec::with_capacity(cells.len());
  for ((division, district, school_type, academic_year, grade_level), cell) in
    cells
  {
    if cell.results < MIN_CELL_SIZE {
      report.reject(RejectReason::SuppressedGroup);
      continue;
    }
    rows.push(EquityMetricsRow {
      division,
      district,
      school_type,
      academic_year,
      grade_level,
      result_count: cell.results,
      student_count: cell.students.len() as i64,
      avg_score: cell.overall.mean().unwrap_or(0.0),
      pass_rate: cell.passed as f64 * 100.0 / cell.results as f64,
      gender: published_pair(cell.male, cell.female, report),
      socioeconomic: published_pair(
        cell.non_low_income,
        cell.low_income,
        report,
      ),
      disability: published_pair(
        cell.without_disability,
        cell.with_disability,
        report,
      ),
      location: published_pair(cell.urban, cell.rural, report),
    });
  }
  rows
}

fn published_pair(
  advantaged: ScoreAccumulator,
  disadvantaged: ScoreAccumulator,
  report: &mut RunReport,
) -> GapStats {
  let (stats, withheld) = GapStats::compute(advantaged, disadvantaged);
  if withheld {
    report.reject(RejectReason::SuppressedSubgroup);
  }
  stats
}

// ─── Student performance ─────────────────────────────────────────────────────

type PerformanceKey = (String, String, String);

#[derive(Default)]
struct PerformanceCell {
  scores:      ScoreAccumulator,
  passed:      i64,
  grades:      GradeCounts,
  school_days: i64,
  present:     i64,
}

fn build_performance(
  assessments: &[ResolvedAssessment<'_>],
  attendances: &[ResolvedAttendance<'_>],
  current_students: &HashMap<&str, &DimStudentRow>,
  current_schools: &HashMap<&str, &DimSchoolRow>,
) -> Vec<StudentPerformanceRow> {
  let mut cells: BTreeMap<PerformanceKey, PerformanceCell> = BTreeMap::new();

  for resolved in assessments {
    let key = (
      resolved.student.student_id.clone(),
      resolved.school.school_id.clone(),
      resolved.fact.academic_year.clone(),
    );
    let cell = cells.entry(key).or_default();
    cell.scores.push(resolved.fact.percentage);
    if resolved.fact.is_pass {
      cell.passed += 1;
    }
    cell.grades.record(resolved.fact.grade_letter);
  }

  for resolved in attendances {
    let key = (
      resolved.student.student_id.clone(),
      resolved.school.school_id.clone(),
      resolved.fact.academic_year.clone(),
    );
    let cell = cells.entry(key).or_default();
    if resolved.fact.counts_toward_rate {
      cell.school_days += 1;
      if resolved.fact.is_present {
        cell.present += 1;
      }
    }
  }

  let mut rows = Vec::with_capacity(cells.len());
  for ((student_id, school_id, academic_year), cell) in cells {
    // Display fields come from the current version of each entity.
    let (student_name, division, district) =
      match current_students.get(student_id.as_str()) {
        Some(student) => (
          student.full_name.clone(),
          student.division.clone(),
          student.district.clone(),
        ),
        None => (
          "Unknown".to_owned(),
          "Unknown".to_owned(),
          "Unknown".to_owned(),
        ),
      };
    let school_name = current_schools
      .get(school_id.as_str())
      .map(|school| school.school_name.clone())
      .unwrap_or_else(|| "Unknown".to_owned());

    let assessment_count = cell.scores.count;
    let avg_percentage = cell.scores.mean();
    let pass_rate = (assessment_count > 0)
      .then(|| cell.passed as f64 * 100.0 / assessment_count as f64);
    let attendance_rate = (cell.school_days > 0)
      .then(|| cell.present as f64 * 100.0 / cell.school_days as f64);

    rows.push(StudentPerformanceRow {
      student_id,
      school_id,
      academic_year,
      student_name,
      school_name,
      division,
      district,
      assessment_count,
      avg_percentage,
      pass_rate,
      performance_band: avg_percentage.map(PerformanceBand::from_percentage),
      grades: cell.grades,
      school_days: cell.school_days,
      present_days: cell.present,
      absent_days: cell.school_days - cell.present,
      attendance_rate,
    });
  }
  rows
}
