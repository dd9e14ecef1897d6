//! The dimension stage: staged source rows become SCD Type 2 version chains.
//!
//! Version planning is pure and per entity: staged records are grouped by
//! cleaned business key, replayed in `(updated_at, source_seq)` order, and a
//! record becomes a new version only when its attribute hash differs from
//! the version immediately before it. Appends are idempotent at the store,
//! so planning the same batch twice converges on the same chains.
//!
//! The geography and calendar lookups ride along: every location seen in a
//! staged student or school contributes a conformed geography row.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use shikkha_core::{
  dimension::{
    DimGeographyRow, DimSchoolRow, DimStudentRow, DimTeacherRow, DimVersion,
    far_future,
  },
  keys,
  normalize::{self, EducationLevel, Gender, SchoolType, SesTier},
  report::{QualityWarning, RejectReason, RunReport},
  source::{SchoolRecord, SourceRecord, Staged, StudentRecord, TeacherRecord},
  store::Warehouse,
};

use crate::{Error, Result};

/// What a dimension run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionBuild {
  pub report:    RunReport,
  /// Highest staged `updated_at` this run considered; `None` when nothing
  /// was staged.
  pub watermark: Option<DateTime<Utc>>,
}

/// Run the dimension stage: read staged rows newer than `since`, extend the
/// version chains, and refresh the geography lookup.
pub async fn run<W>(
  warehouse: &W,
  since: Option<DateTime<Utc>>,
) -> Result<DimensionBuild>
where
  W: Warehouse,
{
  let staged_students =
    warehouse.staged_students(since).await.map_err(Error::store)?;
  let staged_teachers =
    warehouse.staged_teachers(since).await.map_err(Error::store)?;
  let staged_schools =
    warehouse.staged_schools(since).await.map_err(Error::store)?;

  let watermark = staged_students
    .iter()
    .map(|staged| staged.row.updated_at())
    .chain(staged_teachers.iter().map(|staged| staged.row.updated_at()))
    .chain(staged_schools.iter().map(|staged| staged.row.updated_at()))
    .max();

  // Geography keys come from wherever locations appear upstream; the
  // unknown triple is seeded unconditionally.
  let mut geographies: BTreeMap<String, DimGeographyRow> = BTreeMap::new();
  let fallback = DimGeographyRow::conform(None, None, None);
  geographies.insert(fallback.surrogate_key.clone(), fallback);
  for staged in &staged_students {
    let row = &staged.row;
    let geo = DimGeographyRow::conform(
      row.division.as_deref(),
      row.district.as_deref(),
      row.upazila.as_deref(),
    );
    geographies.insert(geo.surrogate_key.clone(), geo);
  }
  for staged in &staged_schools {
    let row = &staged.row;
    let geo = DimGeographyRow::conform(
      row.division.as_deref(),
      row.district.as_deref(),
      row.upazila.as_deref(),
    );
    geographies.insert(geo.surrogate_key.clone(), geo);
  }

  let mut report = RunReport::default();

  let existing = warehouse.student_versions().await.map_err(Error::store)?;
  let planned =
    plan_versions(staged_students, &existing, build_student, &mut report);
  warehouse
    .append_student_versions(planned)
    .await
    .map_err(Error::store)?;

  let existing = warehouse.teacher_versions().await.map_err(Error::store)?;
  let planned =
    plan_versions(staged_teachers, &existing, build_teacher, &mut report);
  warehouse
    .append_teacher_versions(planned)
    .await
    .map_err(Error::store)?;

  let existing = warehouse.school_versions().await.map_err(Error::store)?;
  let planned =
    plan_versions(staged_schools, &existing, build_school, &mut report);
  warehouse
    .append_school_versions(planned)
    .await
    .map_err(Error::store)?;

  let new_geographies = warehouse
    .upsert_geographies(geographies.into_values().collect())
    .await
    .map_err(Error::store)?;
  report.emitted += new_geographies;

  Ok(DimensionBuild { report, watermark })
}

// ─── Version planning ────────────────────────────────────────────────────────

/// Version rows as the planner sees them: effective dating plus the
/// change-detection hash.
trait Versioned: DimVersion {
  fn attr_hash(&self) -> &str;
}

impl Versioned for DimStudentRow {
  fn attr_hash(&self) -> &str {
    &self.attr_hash
  }
}

impl Versioned for DimTeacherRow {
  fn attr_hash(&self) -> &str {
    &self.attr_hash
  }
}

impl Versioned for DimSchoolRow {
  fn attr_hash(&self) -> &str {
    &self.attr_hash
  }
}

/// Plan the version rows a batch of staged records adds to the existing
/// chains.
///
/// Records sharing a business key and `updated_at` collapse to the highest
/// `source_seq`. A record at or before the key's latest committed version is
/// stale and rejected; a record whose attributes hash the same as the
/// version before it adds nothing.
fn plan_versions<T, R, F>(
  staged: Vec<Staged<T>>,
  existing: &[R],
  mut build: F,
  report: &mut RunReport,
) -> Vec<R>
where
  T: SourceRecord,
  R: Versioned,
  F: FnMut(&str, &T, &mut RunReport) -> R,
{
  report.processed += staged.len() as u64;

  let mut groups: BTreeMap<String, Vec<Staged<T>>> = BTreeMap::new();
  for record in staged {
    match normalize::clean_key(record.row.business_key()) {
      Some(key) => groups.entry(key).or_default().push(record),
      None => report.reject(RejectReason::MissingBusinessKey),
    }
  }

  // Latest committed version per key seeds the chain state.
  let mut committed: HashMap<&str, &R> = HashMap::new();
  for version in existing {
    let slot = committed.entry(version.business_key()).or_insert(version);
    if version.effective_from() > slot.effective_from() {
      *slot = version;
    }
  }

  let mut planned = Vec::new();
  for (key, mut records) in groups {
    records.sort_by_key(|r| (r.row.updated_at(), r.source_seq));

    let mut deduped: Vec<Staged<T>> = Vec::with_capacity(records.len());
    for record in records {
      if let Some(last) = deduped.last() {
        if last.row.updated_at() == record.row.updated_at() {
          deduped.pop();
          report.superseded += 1;
        }
      }
      deduped.push(record);
    }

    let seed = committed.get(key.as_str());
    let committed_from = seed.map(|version| version.effective_from());
    let mut last_hash = seed.map(|version| version.attr_hash().to_owned());

    for record in deduped {
      let updated_at = record.row.updated_at();
      if committed_from.is_some_and(|from| updated_at <= from) {
        report.reject(RejectReason::StaleUpdate);
        continue;
      }
      let version = build(&key, &record.row, report);
      if last_hash.as_deref() == Some(version.attr_hash()) {
        continue;
      }
      last_hash = Some(version.attr_hash().to_owned());
      report.emitted += 1;
      planned.push(version);
    }
  }
  planned
}

// ─── Row builders ────────────────────────────────────────────────────────────

fn build_student(
  key: &str,
  record: &StudentRecord,
  report: &mut RunReport,
) -> DimStudentRow {
  let full_name = conform_name(&record.full_name);
  let gender = conform_gender(record.gender.as_deref(), report);
  let division = conform_place(record.division.as_deref());
  let district = conform_place(record.district.as_deref());
  let upazila = conform_place(record.upazila.as_deref());
  let socioeconomic_tier =
    conform_ses(record.socioeconomic_status.as_deref(), report);
  let has_disability = record
    .disability_status
    .as_deref()
    .and_then(normalize::disability_flag);
  let guardian_contact = trimmed(record.guardian_contact.as_deref());

  let effective_from = record.updated_at;
  let age_group = record
    .date_of_birth
    .and_then(|dob| normalize::age_group(dob, effective_from.date_naive()))
    .map(str::to_owned);

  let dob_text = record.date_of_birth.map(|d| d.to_string());
  let attr_hash = keys::attr_hash(&[
    Some(&full_name),
    Some(gender.as_str()),
    dob_text.as_deref(),
    Some(&division),
    Some(&district),
    Some(&upazila),
    Some(socioeconomic_tier.as_str()),
    has_disability.map(|d| if d { "true" } else { "false" }),
    guardian_contact.as_deref(),
  ]);

  DimStudentRow {
    surrogate_key: keys::surrogate_key(
      keys::tag::DIM_STUDENT,
      key,
      effective_from,
    ),
    student_id: key.to_owned(),
    full_name,
    gender,
    date_of_birth: record.date_of_birth,
    division,
    district,
    upazila,
    socioeconomic_tier,
    has_disability,
    guardian_contact,
    age_group,
    attr_hash,
    effective_from,
    effective_to: far_future(),
    is_current: true,
  }
}

fn build_teacher(
  key: &str,
  record: &TeacherRecord,
  report: &mut RunReport,
) -> DimTeacherRow {
  let full_name = conform_name(&record.full_name);
  let gender = conform_gender(record.gender.as_deref(), report);
  let school_id = record.school_id.as_deref().and_then(normalize::clean_key);
  let subject_specialty =
    record.subject_specialty.as_deref().and_then(normalize::clean_text);
  let qualification =
    record.qualification.as_deref().and_then(normalize::clean_text);

  let effective_from = record.updated_at;
  let hire_text = record.hire_date.map(|d| d.to_string());
  let attr_hash = keys::attr_hash(&[
    Some(&full_name),
    Some(gender.as_str()),
    school_id.as_deref(),
    subject_specialty.as_deref(),
    qualification.as_deref(),
    hire_text.as_deref(),
  ]);

  DimTeacherRow {
    surrogate_key: keys::surrogate_key(
      keys::tag::DIM_TEACHER,
      key,
      effective_from,
    ),
    teacher_id: key.to_owned(),
    full_name,
    gender,
    school_id,
    subject_specialty,
    qualification,
    hire_date: record.hire_date,
    attr_hash,
    effective_from,
    effective_to: far_future(),
    is_current: true,
  }
}

fn build_school(
  key: &str,
  record: &SchoolRecord,
  report: &mut RunReport,
) -> DimSchoolRow {
  let school_name = conform_name(&record.school_name);
  let school_type = conform_school_type(record.school_type.as_deref(), report);
  let education_level =
    conform_education_level(record.education_level.as_deref(), report);
  let division = conform_place(record.division.as_deref());
  let district = conform_place(record.district.as_deref());
  let upazila = conform_place(record.upazila.as_deref());
  let is_rural = !normalize::is_urban_district(&district);
  let geo_location = trimmed(record.geo_location.as_deref());

  let effective_from = record.updated_at;
  // is_rural is derived from the district, so it stays out of the hash.
  let attr_hash = keys::attr_hash(&[
    Some(&school_name),
    Some(school_type.as_str()),
    Some(education_level.as_str()),
    Some(&division),
    Some(&district),
    Some(&upazila),
    geo_location.as_deref(),
  ]);

  DimSchoolRow {
    surrogate_key: keys::surrogate_key(
      keys::tag::DIM_SCHOOL,
      key,
      effective_from,
    ),
    school_id: key.to_owned(),
    school_name,
    school_type,
    education_level,
    division,
    district,
    upazila,
    is_rural,
    geo_location,
    attr_hash,
    effective_from,
    effective_to: far_future(),
    is_current: true,
  }
}

// ─── Attribute conforming ────────────────────────────────────────────────────

fn conform_name(raw: &str) -> String {
  normalize::clean_text(raw).unwrap_or_else(|| "Unknown".to_owned())
}

fn conform_place(raw: Option<&str>) -> String {
  raw
    .and_then(normalize::clean_text)
    .unwrap_or_else(|| "Unknown".to_owned())
}

fn trimmed(raw: Option<&str>) -> Option<String> {
  raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

fn conform_gender(raw: Option<&str>, report: &mut RunReport) -> Gender {
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return Gender::Unknown;
  };
  match Gender::parse(value) {
    Some(gender) => gender,
    None => {
      report.warn(QualityWarning::UnrecognizedGender);
      Gender::Unknown
    }
  }
}

fn conform_ses(raw: Option<&str>, report: &mut RunReport) -> SesTier {
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return SesTier::Unknown;
  };
  match SesTier::parse(value) {
    Some(tier) => tier,
    None => {
      report.warn(QualityWarning::UnrecognizedSesTier);
      SesTier::Unknown
    }
  }
}

fn conform_school_type(raw: Option<&str>, report: &mut RunReport) -> SchoolType {
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return SchoolType::Other;
  };
  match SchoolType::parse(value) {
    Some(school_type) => school_type,
    None => {
      report.warn(QualityWarning::UnrecognizedSchoolType);
      SchoolType::Other
    }
  }
}

fn conform_education_level(
  raw: Option<&str>,
  report: &mut RunReport,
) -> EducationLevel {
  let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
    return EducationLevel::Other;
  };
  match EducationLevel::parse(value) {
    Some(level) => level,
    None => {
      report.warn(QualityWarning::UnrecognizedEducationLevel);
      EducationLevel::Other
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone};

  use super::*;

  fn dt(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
  }

  fn student(
    id: &str,
    district: &str,
    updated_at: DateTime<Utc>,
  ) -> StudentRecord {
    StudentRecord {
      student_id:           id.into(),
      full_name:            "rahima khatun".into(),
      gender:               Some("F".into()),
      date_of_birth:        NaiveDate::from_ymd_opt(2012, 4, 15),
      division:             Some("Dhaka".into()),
      district:             Some(district.into()),
      upazila:              Some("Savar".into()),
      socioeconomic_status: Some("low".into()),
      disability_status:    Some("none".into()),
      guardian_contact:     None,
      updated_at,
    }
  }

  fn staged(seq: i64, row: StudentRecord) -> Staged<StudentRecord> {
    Staged { source_seq: seq, row }
  }

  fn plan(
    batch: Vec<Staged<StudentRecord>>,
    existing: &[DimStudentRow],
  ) -> (Vec<DimStudentRow>, RunReport) {
    let mut report = RunReport::default();
    let planned = plan_versions(batch, existing, build_student, &mut report);
    (planned, report)
  }

  #[test]
  fn first_sighting_of_each_key_becomes_a_version() {
    let batch = vec![
      staged(1, student("STU-1", "Dhaka", dt(2024, 1, 1, 6))),
      staged(2, student("STU-2", "Bogra", dt(2024, 1, 1, 7))),
    ];
    let (planned, report) = plan(batch, &[]);

    assert_eq!(planned.len(), 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.emitted, 2);
    assert_eq!(report.superseded, 0);
    assert_eq!(planned[0].student_id, "STU-1");
    assert_eq!(planned[0].full_name, "Rahima Khatun");
    assert_eq!(planned[0].effective_from, dt(2024, 1, 1, 6));
    assert!(planned[0].is_current);
  }

  #[test]
  fn changed_attributes_chain_in_updated_at_order() {
    // Arrival order disagrees with event order; the chain follows updated_at.
    let batch = vec![
      staged(1, student("STU-1", "Sylhet", dt(2024, 6, 1, 0))),
      staged(2, student("STU-1", "Dhaka", dt(2024, 1, 1, 0))),
    ];
    let (planned, report) = plan(batch, &[]);

    assert_eq!(planned.len(), 2);
    assert_eq!(report.emitted, 2);
    assert_eq!(planned[0].district, "Dhaka");
    assert_eq!(planned[1].district, "Sylhet");
    assert!(planned[0].surrogate_key != planned[1].surrogate_key);
  }

  #[test]
  fn equal_instant_duplicates_collapse_to_highest_seq() {
    let at = dt(2024, 1, 1, 6);
    let batch = vec![
      staged(1, student("STU-1", "Dhaka", at)),
      staged(2, student("STU-1", "Sylhet", at)),
    ];
    let (planned, report) = plan(batch, &[]);

    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].district, "Sylhet");
    assert_eq!(report.superseded, 1);
    assert_eq!(report.emitted, 1);
  }

  #[test]
  fn unchanged_attributes_add_no_version() {
    let batch = vec![
      staged(1, student("STU-1", "Dhaka", dt(2024, 1, 1, 0))),
      staged(2, student("STU-1", "Dhaka", dt(2024, 2, 1, 0))),
    ];
    let (planned, report) = plan(batch, &[]);

    assert_eq!(planned.len(), 1);
    assert_eq!(report.processed, 2);
    assert_eq!(report.emitted, 1);
    assert_eq!(report.total_rejected(), 0);
  }

  #[test]
  fn resubmission_matching_the_committed_version_adds_nothing() {
    let mut seed_report = RunReport::default();
    let committed = build_student(
      "STU-1",
      &student("STU-1", "Dhaka", dt(2024, 1, 1, 0)),
      &mut seed_report,
    );

    let batch = vec![staged(5, student("STU-1", "Dhaka", dt(2024, 3, 1, 0)))];
    let (planned, report) = plan(batch, &[committed]);

    assert!(planned.is_empty());
    assert_eq!(report.emitted, 0);
    assert_eq!(report.total_rejected(), 0);
  }

  #[test]
  fn updates_at_or_before_the_committed_version_are_stale() {
    let mut seed_report = RunReport::default();
    let committed = build_student(
      "STU-1",
      &student("STU-1", "Sylhet", dt(2024, 6, 1, 0)),
      &mut seed_report,
    );

    let batch = vec![
      staged(7, student("STU-1", "Dhaka", dt(2024, 5, 1, 0))),
      staged(8, student("STU-1", "Dhaka", dt(2024, 6, 1, 0))),
    ];
    let (planned, report) = plan(batch, &[committed]);

    assert!(planned.is_empty());
    assert_eq!(report.rejected_for(RejectReason::StaleUpdate), 2);
  }

  #[test]
  fn blank_business_keys_are_rejected() {
    let batch = vec![staged(1, student("   ", "Dhaka", dt(2024, 1, 1, 0)))];
    let (planned, report) = plan(batch, &[]);

    assert!(planned.is_empty());
    assert_eq!(report.rejected_for(RejectReason::MissingBusinessKey), 1);
  }

  #[test]
  fn key_spellings_conform_to_one_chain() {
    let batch = vec![
      staged(1, student(" stu-1 ", "Dhaka", dt(2024, 1, 1, 0))),
      staged(2, student("STU-1", "Sylhet", dt(2024, 2, 1, 0))),
    ];
    let (planned, _) = plan(batch, &[]);

    assert_eq!(planned.len(), 2);
    assert!(planned.iter().all(|v| v.student_id == "STU-1"));
  }

  #[test]
  fn unparseable_gender_warns_and_falls_back() {
    let mut record = student("STU-1", "Dhaka", dt(2024, 1, 1, 0));
    record.gender = Some("X9".into());
    let (planned, report) = plan(vec![staged(1, record)], &[]);

    assert_eq!(planned[0].gender, Gender::Unknown);
    assert_eq!(report.warned_for(QualityWarning::UnrecognizedGender), 1);

    // A missing value is not a quality problem.
    let mut record = student("STU-2", "Dhaka", dt(2024, 1, 1, 0));
    record.gender = None;
    let (planned, report) = plan(vec![staged(2, record)], &[]);
    assert_eq!(planned[0].gender, Gender::Unknown);
    assert_eq!(report.warned_for(QualityWarning::UnrecognizedGender), 0);
  }

  #[test]
  fn age_group_follows_the_version_date_and_skips_the_hash() {
    let a = build_student(
      "STU-1",
      &student("STU-1", "Dhaka", dt(2024, 1, 1, 0)),
      &mut RunReport::default(),
    );
    // Same attributes eight years later: different age band, same hash.
    let b = build_student(
      "STU-1",
      &student("STU-1", "Dhaka", dt(2032, 1, 1, 0)),
      &mut RunReport::default(),
    );
    assert_eq!(a.age_group.as_deref(), Some("10-14"));
    assert_eq!(b.age_group.as_deref(), Some("15-19"));
    assert_eq!(a.attr_hash, b.attr_hash);
  }
}
