//! Stage sequencing, ordering guards, and the run-log protocol.
//!
//! Each stage execution writes its run record twice: once when it starts,
//! once when it finishes, successfully or not. The run log is also where
//! ordering lives: the facts guard compares staged dimension freshness
//! against the dimension watermark, and the marts guard requires a prior
//! successful fact run.

use chrono::{DateTime, Utc};
use shikkha_core::{
  calendar::LoadWindow,
  report::{RunRecord, RunReport, RunStatus, Stage},
  store::Warehouse,
};
use uuid::Uuid;

use crate::{Error, Result, dims, facts, marts};

/// Sequences pipeline stages over a warehouse.
pub struct Pipeline<W> {
  warehouse: W,
}

impl<W: Warehouse> Pipeline<W> {
  pub fn new(warehouse: W) -> Self {
    Self { warehouse }
  }

  pub fn warehouse(&self) -> &W {
    &self.warehouse
  }

  /// Run the dimension stage. Incremental runs only consider staged rows
  /// newer than the last successful run's watermark; `full` replays the
  /// whole staged history.
  pub async fn run_dimensions(&self, full: bool) -> Result<RunRecord> {
    let since = if full { None } else { self.dims_watermark().await? };
    let record =
      RunRecord::begin(Uuid::new_v4(), Stage::Dimensions, None, Utc::now());
    self
      .warehouse
      .record_run(record.clone())
      .await
      .map_err(Error::store)?;

    match dims::run(&self.warehouse, since).await {
      Ok(build) => {
        tracing::info!(
          "dimension build emitted {} rows, rejected {}",
          build.report.emitted,
          build.report.total_rejected()
        );
        let watermark = build.watermark.max(since);
        self.finish(record, watermark, build.report).await
      }
      Err(error) => self.abort(record, error).await,
    }
  }

  /// Run the fact stage over `window`.
  pub async fn run_facts(&self, window: LoadWindow) -> Result<RunRecord> {
    self.guard_facts(window).await?;
    let record =
      RunRecord::begin(Uuid::new_v4(), Stage::Facts, Some(window), Utc::now());
    self
      .warehouse
      .record_run(record.clone())
      .await
      .map_err(Error::store)?;

    match facts::run(&self.warehouse, window).await {
      Ok(report) => {
        tracing::info!(
          "fact build over {window} emitted {} rows, rejected {}",
          report.emitted,
          report.total_rejected()
        );
        self.finish(record, None, report).await
      }
      Err(error) => self.abort(record, error).await,
    }
  }

  /// Run the mart stage.
  pub async fn run_marts(&self) -> Result<RunRecord> {
    self.guard_marts().await?;
    let record =
      RunRecord::begin(Uuid::new_v4(), Stage::Marts, None, Utc::now());
    self
      .warehouse
      .record_run(record.clone())
      .await
      .map_err(Error::store)?;

    match marts::run(&self.warehouse).await {
      Ok(report) => {
        tracing::info!("mart refresh emitted {} rows", report.emitted);
        self.finish(record, None, report).await
      }
      Err(error) => self.abort(record, error).await,
    }
  }

  /// Run all three stages in order over one load window.
  pub async fn run_all(&self, window: LoadWindow) -> Result<Vec<RunRecord>> {
    let dimensions = self.run_dimensions(false).await?;
    let facts = self.run_facts(window).await?;
    let marts = self.run_marts().await?;
    Ok(vec![dimensions, facts, marts])
  }

  // ─── Guards ────────────────────────────────────────────────────────────────

  /// Facts may not build while staged dimension rows at or before the
  /// window end remain unapplied; they would resolve against stale chains.
  async fn guard_facts(&self, window: LoadWindow) -> Result<()> {
    let staged_high = self
      .warehouse
      .staged_dim_high_water(window.end_instant())
      .await
      .map_err(Error::store)?;
    let applied = self.dims_watermark().await?;
    match staged_high {
      Some(high) if applied.map_or(true, |watermark| high > watermark) => {
        Err(Error::StageOrder(format!(
          "staged dimension rows up to {high} have not been applied; run \
           the dimension stage first"
        )))
      }
      _ => Ok(()),
    }
  }

  /// Marts read the fact tables, so at least one successful fact run must
  /// precede them.
  async fn guard_marts(&self) -> Result<()> {
    let runs =
      self.warehouse.runs(Some(Stage::Facts)).await.map_err(Error::store)?;
    if runs.iter().any(|run| run.status == RunStatus::Succeeded) {
      Ok(())
    } else {
      Err(Error::StageOrder(
        "no successful fact run precedes the mart refresh; run the fact \
         stage first"
          .to_owned(),
      ))
    }
  }

  /// Watermark of the most advanced successful dimension run, if any.
  async fn dims_watermark(&self) -> Result<Option<DateTime<Utc>>> {
    let runs = self
      .warehouse
      .runs(Some(Stage::Dimensions))
      .await
      .map_err(Error::store)?;
    Ok(
      runs
        .iter()
        .filter(|run| run.status == RunStatus::Succeeded)
        .filter_map(|run| run.source_watermark)
        .max(),
    )
  }

  // ─── Run-log bookkeeping ───────────────────────────────────────────────────

  async fn finish(
    &self,
    record: RunRecord,
    watermark: Option<DateTime<Utc>>,
    report: RunReport,
  ) -> Result<RunRecord> {
    let done = record.succeed(Utc::now(), watermark, report);
    self
      .warehouse
      .record_run(done.clone())
      .await
      .map_err(Error::store)?;
    Ok(done)
  }

  async fn abort(&self, record: RunRecord, error: Error) -> Result<RunRecord> {
    let stage = record.stage;
    let failed = record.fail(Utc::now());
    if let Err(log_error) = self.warehouse.record_run(failed).await {
      tracing::warn!(
        "could not record failed {} run: {log_error}",
        stage.as_str()
      );
    }
    Err(error)
  }
}
