//! `shikkha` pipeline binary.
//!
//! Reads `shikkha.toml` (or the path specified with `--config`), opens the
//! SQLite warehouse, and runs one pipeline command against it.
//!
//! # Usage
//!
//! ```
//! shikkha ingest --entity students students.jsonl
//! shikkha build-dims
//! shikkha build-facts --from 2024-01 --to 2024-06
//! shikkha build-marts
//! shikkha run --from 2024-06
//! shikkha status
//! ```

mod ingest;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use shikkha_core::{
  calendar::{LoadWindow, YearMonth},
  report::RunRecord,
  store::Warehouse,
};
use shikkha_elt::Pipeline;
use shikkha_store_sqlite::SqliteWarehouse;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shikkha education warehouse pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "shikkha.toml")]
  config: PathBuf,

  /// Warehouse database path; overrides the config file.
  #[arg(long)]
  warehouse: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Append a JSONL extract file to the raw layer.
  Ingest(IngestArgs),
  /// Extend the dimension version chains from staged rows.
  BuildDims(BuildDimsArgs),
  /// Rebuild the fact partitions covering a month window.
  BuildFacts(WindowArgs),
  /// Recompute the published marts.
  BuildMarts,
  /// Run dimensions, facts, and marts in order.
  Run(WindowArgs),
  /// Show warehouse table sizes and recent runs.
  Status,
}

#[derive(Args)]
struct IngestArgs {
  /// Entity the files hold: students, teachers, schools, enrollments,
  /// attendances, or assessment-results.
  #[arg(long)]
  entity: String,

  /// Extract files, one JSON record per line.
  #[arg(required = true)]
  files: Vec<PathBuf>,
}

#[derive(Args)]
struct BuildDimsArgs {
  /// Replay the whole staged history instead of only rows newer than the
  /// last successful dimension run.
  #[arg(long)]
  full: bool,
}

#[derive(Args)]
struct WindowArgs {
  /// First partition month, as `YYYY-MM`.
  #[arg(long)]
  from: String,

  /// Last partition month, inclusive; defaults to `--from`.
  #[arg(long)]
  to: Option<String>,
}

impl WindowArgs {
  fn window(&self) -> anyhow::Result<LoadWindow> {
    let from = YearMonth::parse(&self.from)?;
    let to = match &self.to {
      Some(label) => YearMonth::parse(label)?,
      None => from,
    };
    Ok(LoadWindow::new(from, to)?)
  }
}

/// Shape of the optional `shikkha.toml` file.
#[derive(Deserialize)]
struct PipelineConfig {
  #[serde(default = "default_warehouse_path")]
  warehouse_path: PathBuf,
}

fn default_warehouse_path() -> PathBuf {
  PathBuf::from("shikkha.db")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SHIKKHA"))
    .build()
    .context("failed to read config file")?;

  let pipeline_cfg: PipelineConfig = settings
    .try_deserialize()
    .context("failed to deserialise PipelineConfig")?;

  let warehouse_path =
    expand_tilde(&cli.warehouse.unwrap_or(pipeline_cfg.warehouse_path));

  let warehouse = SqliteWarehouse::open(&warehouse_path)
    .await
    .with_context(|| format!("failed to open {warehouse_path:?}"))?;
  let pipeline = Pipeline::new(warehouse);

  match cli.command {
    Command::Ingest(args) => {
      let entity = ingest::parse_entity(&args.entity)?;
      let mut appended = 0u64;
      let mut skipped = 0u64;
      for file in &args.files {
        let outcome =
          ingest::ingest_file(pipeline.warehouse(), entity, file).await?;
        appended += outcome.appended;
        skipped += outcome.skipped;
      }
      println!("appended={appended} skipped={skipped}");
    }
    Command::BuildDims(args) => {
      let record = pipeline.run_dimensions(args.full).await?;
      print_outcome(&record)?;
    }
    Command::BuildFacts(args) => {
      let record = pipeline.run_facts(args.window()?).await?;
      print_outcome(&record)?;
    }
    Command::BuildMarts => {
      let record = pipeline.run_marts().await?;
      print_outcome(&record)?;
    }
    Command::Run(args) => {
      for record in pipeline.run_all(args.window()?).await? {
        print_outcome(&record)?;
      }
    }
    Command::Status => print_status(pipeline.warehouse()).await?,
  }

  Ok(())
}

fn print_outcome(record: &RunRecord) -> anyhow::Result<()> {
  println!(
    "stage={} status={} run_id={}",
    record.stage.as_str(),
    record.status.as_str(),
    record.run_id
  );
  let Some(report) = &record.report else {
    return Ok(());
  };
  println!(
    "  processed={} emitted={} superseded={} rejected={}",
    report.processed,
    report.emitted,
    report.superseded,
    report.total_rejected()
  );
  if !report.rejected.is_empty() {
    println!("  rejections={}", serde_json::to_string(&report.rejected)?);
  }
  if !report.warnings.is_empty() {
    println!("  warnings={}", serde_json::to_string(&report.warnings)?);
  }
  Ok(())
}

async fn print_status(warehouse: &SqliteWarehouse) -> anyhow::Result<()> {
  println!("tables:");
  for (table, count) in warehouse.row_counts().await? {
    println!("  {table:<24} {count:>10}");
  }

  let runs = warehouse.runs(None).await?;
  println!("recent runs:");
  for record in runs.iter().take(10) {
    let window = match record.window {
      Some(window) => window.to_string(),
      None => "-".to_owned(),
    };
    println!(
      "  {} {:<10} {:<9} window={window} started={}",
      record.run_id,
      record.stage.as_str(),
      record.status.as_str(),
      record.started_at.format("%Y-%m-%dT%H:%M:%SZ"),
    );
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
