//! Run accounting: stages, outcome records, and data-quality counters.
//!
//! Every pipeline stage writes one run record whether it succeeds or fails,
//! and a successful record carries the report of what the stage processed,
//! emitted, and rejected. Rejected rows are counted by reason, never
//! silently dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::LoadWindow;

// ─── Stages ──────────────────────────────────────────────────────────────────

/// The pipeline stages, in their only permitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  Dimensions,
  Facts,
  Marts,
}

impl Stage {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Dimensions => "dimensions",
      Self::Facts => "facts",
      Self::Marts => "marts",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw {
      "dimensions" => Some(Self::Dimensions),
      "facts" => Some(Self::Facts),
      "marts" => Some(Self::Marts),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
  Running,
  Succeeded,
  Failed,
}

impl RunStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Running => "running",
      Self::Succeeded => "succeeded",
      Self::Failed => "failed",
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    match raw {
      "running" => Some(Self::Running),
      "succeeded" => Some(Self::Succeeded),
      "failed" => Some(Self::Failed),
      _ => None,
    }
  }
}

// ─── Data-quality taxonomy ───────────────────────────────────────────────────

/// Why a row was excluded from its target table.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
  /// The business key was missing or blank after trimming.
  MissingBusinessKey,
  /// An update older than the entity's latest committed version.
  StaleUpdate,
  /// A required dimension reference could not be resolved as of the
  /// business date.
  UnknownDimension,
  /// The business date falls outside the load window.
  OutOfWindow,
  /// Measures that cannot produce a valid score.
  InvalidMeasure,
  /// A whole reporting group below the publication floor.
  SuppressedGroup,
  /// A subgroup pair whose gap was withheld by the publication floor.
  SuppressedSubgroup,
}

/// A value was salvaged but looked wrong; the row still went through.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityWarning {
  UnrecognizedGender,
  UnrecognizedSchoolType,
  UnrecognizedEducationLevel,
  UnrecognizedEnrollmentStatus,
  UnrecognizedAttendanceStatus,
  UnrecognizedSesTier,
  UnrecognizedTerm,
  /// An assessment named a teacher the dimension has never seen; the fact
  /// keeps a null teacher reference.
  UnresolvedTeacher,
}

// ─── RunReport ───────────────────────────────────────────────────────────────

/// Counters accumulated over one stage run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
  /// Source rows considered, after staging but before any filtering.
  pub processed:  u64,
  /// Rows written to target tables.
  pub emitted:    u64,
  /// Source rows superseded by a newer duplicate during deduplication.
  pub superseded: u64,
  #[serde(default)]
  pub rejected:   BTreeMap<RejectReason, u64>,
  #[serde(default)]
  pub warnings:   BTreeMap<QualityWarning, u64>,
}

impl RunReport {
  pub fn reject(&mut self, reason: RejectReason) {
    *self.rejected.entry(reason).or_insert(0) += 1;
  }

  pub fn warn(&mut self, warning: QualityWarning) {
    *self.warnings.entry(warning).or_insert(0) += 1;
  }

  pub fn rejected_for(&self, reason: RejectReason) -> u64 {
    self.rejected.get(&reason).copied().unwrap_or(0)
  }

  pub fn warned_for(&self, warning: QualityWarning) -> u64 {
    self.warnings.get(&warning).copied().unwrap_or(0)
  }

  pub fn total_rejected(&self) -> u64 {
    self.rejected.values().sum()
  }

  /// Fold another report into this one (used when a stage covers several
  /// entities).
  pub fn absorb(&mut self, other: RunReport) {
    self.processed += other.processed;
    self.emitted += other.emitted;
    self.superseded += other.superseded;
    for (reason, n) in other.rejected {
      *self.rejected.entry(reason).or_insert(0) += n;
    }
    for (warning, n) in other.warnings {
      *self.warnings.entry(warning).or_insert(0) += n;
    }
  }
}

// ─── RunRecord ───────────────────────────────────────────────────────────────

/// One row of the run log.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
  pub run_id:           Uuid,
  pub stage:            Stage,
  /// The partition window for fact runs; `None` for the other stages.
  pub window:           Option<LoadWindow>,
  pub started_at:       DateTime<Utc>,
  pub finished_at:      Option<DateTime<Utc>>,
  pub status:           RunStatus,
  /// Highest source `updated_at` this run has folded into the warehouse.
  /// Only dimension runs carry one.
  pub source_watermark: Option<DateTime<Utc>>,
  pub report:           Option<RunReport>,
}

impl RunRecord {
  /// A freshly started run, not yet finished.
  pub fn begin(
    run_id: Uuid,
    stage: Stage,
    window: Option<LoadWindow>,
    started_at: DateTime<Utc>,
  ) -> Self {
    Self {
      run_id,
      stage,
      window,
      started_at,
      finished_at: None,
      status: RunStatus::Running,
      source_watermark: None,
      report: None,
    }
  }

  pub fn succeed(
    mut self,
    finished_at: DateTime<Utc>,
    watermark: Option<DateTime<Utc>>,
    report: RunReport,
  ) -> Self {
    self.finished_at = Some(finished_at);
    self.status = RunStatus::Succeeded;
    self.source_watermark = watermark;
    self.report = Some(report);
    self
  }

  pub fn fail(mut self, finished_at: DateTime<Utc>) -> Self {
    self.finished_at = Some(finished_at);
    self.status = RunStatus::Failed;
    self
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn report_counters_accumulate() {
    let mut report = RunReport::default();
    report.processed = 10;
    report.emitted = 7;
    report.reject(RejectReason::MissingBusinessKey);
    report.reject(RejectReason::MissingBusinessKey);
    report.reject(RejectReason::StaleUpdate);
    report.warn(QualityWarning::UnrecognizedGender);

    assert_eq!(report.rejected_for(RejectReason::MissingBusinessKey), 2);
    assert_eq!(report.rejected_for(RejectReason::StaleUpdate), 1);
    assert_eq!(report.rejected_for(RejectReason::OutOfWindow), 0);
    assert_eq!(report.total_rejected(), 3);
    assert_eq!(report.warned_for(QualityWarning::UnrecognizedGender), 1);
  }

  #[test]
  fn absorb_merges_by_key() {
    let mut a = RunReport::default();
    a.processed = 5;
    a.reject(RejectReason::OutOfWindow);

    let mut b = RunReport::default();
    b.processed = 3;
    b.emitted = 2;
    b.reject(RejectReason::OutOfWindow);
    b.warn(QualityWarning::UnrecognizedSesTier);

    a.absorb(b);
    assert_eq!(a.processed, 8);
    assert_eq!(a.emitted, 2);
    assert_eq!(a.rejected_for(RejectReason::OutOfWindow), 2);
    assert_eq!(a.warned_for(QualityWarning::UnrecognizedSesTier), 1);
  }

  #[test]
  fn report_round_trips_through_json() {
    let mut report = RunReport::default();
    report.processed = 4;
    report.emitted = 3;
    report.reject(RejectReason::UnknownDimension);
    report.warn(QualityWarning::UnresolvedTeacher);

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("unknown_dimension"));
    let back: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
  }

  #[test]
  fn run_record_lifecycle() {
    let t0 = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap();
    let t1 = t0 + chrono::Duration::minutes(3);
    let record =
      RunRecord::begin(Uuid::new_v4(), Stage::Dimensions, None, t0);
    assert_eq!(record.status, RunStatus::Running);
    assert!(record.finished_at.is_none());

    let done = record.clone().succeed(t1, Some(t0), RunReport::default());
    assert_eq!(done.status, RunStatus::Succeeded);
    assert_eq!(done.finished_at, Some(t1));

    let failed = record.fail(t1);
    assert_eq!(failed.status, RunStatus::Failed);
    assert!(failed.report.is_none());
  }
}
