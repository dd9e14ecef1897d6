//! JSONL ingestion into the raw layer.
//!
//! Each line of an extract file is one source record. Lines that fail to
//! parse are counted and skipped rather than failing the whole file, so a
//! single malformed export row cannot block a load.

use std::path::Path;

use anyhow::{Context as _, Result, anyhow};
use serde::de::DeserializeOwned;
use shikkha_core::{
  source::{
    AssessmentRecord, AttendanceRecord, EnrollmentRecord, SchoolRecord,
    StudentRecord, TeacherRecord,
  },
  store::Warehouse,
};
use shikkha_store_sqlite::SqliteWarehouse;

/// Which raw table an extract file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Students,
  Teachers,
  Schools,
  Enrollments,
  Attendances,
  Assessments,
}

pub fn parse_entity(raw: &str) -> Result<Entity> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "students" | "student" => Ok(Entity::Students),
    "teachers" | "teacher" => Ok(Entity::Teachers),
    "schools" | "school" => Ok(Entity::Schools),
    "enrollments" | "enrollment" => Ok(Entity::Enrollments),
    "attendances" | "attendance" => Ok(Entity::Attendances),
    "assessment-results" | "assessment_results" | "assessments"
    | "results" => Ok(Entity::Assessments),
    other => Err(anyhow!(
      "unknown entity '{other}'; expected students, teachers, schools, \
       enrollments, attendances, or assessment-results"
    )),
  }
}

/// Outcome of one file: rows appended to the raw layer and lines skipped.
pub struct Ingest {
  pub appended: u64,
  pub skipped:  u64,
}

pub async fn ingest_file(
  warehouse: &SqliteWarehouse,
  entity: Entity,
  path: &Path,
) -> Result<Ingest> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;

  let outcome = match entity {
    Entity::Students => {
      let (rows, skipped) = parse_jsonl::<StudentRecord>(&raw);
      Ingest { appended: warehouse.append_students(rows).await?, skipped }
    }
    Entity::Teachers => {
      let (rows, skipped) = parse_jsonl::<TeacherRecord>(&raw);
      Ingest { appended: warehouse.append_teachers(rows).await?, skipped }
    }
    Entity::Schools => {
      let (rows, skipped) = parse_jsonl::<SchoolRecord>(&raw);
      Ingest { appended: warehouse.append_schools(rows).await?, skipped }
    }
    Entity::Enrollments => {
      let (rows, skipped) = parse_jsonl::<EnrollmentRecord>(&raw);
      Ingest { appended: warehouse.append_enrollments(rows).await?, skipped }
    }
    Entity::Attendances => {
      let (rows, skipped) = parse_jsonl::<AttendanceRecord>(&raw);
      Ingest { appended: warehouse.append_attendances(rows).await?, skipped }
    }
    Entity::Assessments => {
      let (rows, skipped) = parse_jsonl::<AssessmentRecord>(&raw);
      Ingest { appended: warehouse.append_assessments(rows).await?, skipped }
    }
  };

  tracing::info!(
    "appended {} rows from {}, skipped {}",
    outcome.appended,
    path.display(),
    outcome.skipped
  );
  Ok(outcome)
}

fn parse_jsonl<T: DeserializeOwned>(raw: &str) -> (Vec<T>, u64) {
  let mut rows = Vec::new();
  let mut skipped = 0u64;
  for (number, line) in raw.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    match serde_json::from_str(line) {
      Ok(row) => rows.push(row),
      Err(error) => {
        skipped += 1;
        tracing::warn!("skipping unparseable line {}: {error}", number + 1);
      }
    }
  }
  (rows, skipped)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bad_lines_are_counted_not_fatal() {
    let raw = concat!(
      r#"{"student_id":"STU-1","name":"rahima","updated_at":"2024-01-01T06:00:00Z"}"#,
      "\n",
      "not json at all\n",
      "\n",
      r#"{"student_id":"STU-2","name":"karim","updated_at":"2024-01-02T06:00:00Z"}"#,
      "\n",
    );
    let (rows, skipped) = parse_jsonl::<StudentRecord>(raw);
    assert_eq!(rows.len(), 2);
    assert_eq!(skipped, 1);
    assert_eq!(rows[0].student_id, "STU-1");
    assert_eq!(rows[1].full_name, "karim");
  }

  #[test]
  fn entity_names_parse_loosely() {
    assert_eq!(parse_entity("Students").unwrap(), Entity::Students);
    assert_eq!(parse_entity(" results ").unwrap(), Entity::Assessments);
    assert!(parse_entity("chairs").is_err());
  }
}
