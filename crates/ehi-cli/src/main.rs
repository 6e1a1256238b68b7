//! `ehi`, the operator CLI for the ecosystem health pipeline server.
//!
//! # Usage
//!
//! ```
//! ehi --url http://localhost:3001 run
//! ehi ingest climate
//! ehi calculate --biodiversity 0.4 --vegetation 0.1
//! ehi --config ~/.config/ehi/config.toml status
//! ```

mod client;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::ApiClient;
use ehi_core::{
  scoring::PartialWeights,
  site::Site,
  source::SourceKind,
};
use ehi_pipeline::{EhiResult, PipelineStatus, RunOutcome, RunState};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:3001";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ehi", about = "Operate the ecosystem health index pipeline")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the EHI server (default: http://localhost:3001).
  #[arg(long, env = "EHI_URL")]
  url: Option<String>,

  /// Print raw JSON instead of tables.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Ingest every source, then score all sites.
  Run,
  /// Rescore all sites from the current source tables.
  Recompute,
  /// Re-ingest one source (gbif, climate, landcover, footprint) and rescore.
  Ingest {
    #[arg(value_parser = parse_source)]
    source: SourceKind,
  },
  /// Score all sites with custom weights without persisting. Omitted
  /// weights keep their defaults.
  Calculate {
    #[arg(long)]
    biodiversity:   Option<f64>,
    #[arg(long)]
    climate:        Option<f64>,
    #[arg(long)]
    human_pressure: Option<f64>,
    #[arg(long)]
    vegetation:     Option<f64>,
  },
  /// Table counts, average score and pipeline state.
  Status,
  /// List registered sites with their persisted scores.
  Sites,
}

fn parse_source(s: &str) -> Result<SourceKind, String> { s.parse().map_err(|e| format!("{e}")) }

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags (and EHI_URL) override the config file, which overrides the default.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then_some(file_cfg.url))
    .unwrap_or_else(|| DEFAULT_URL.to_string());

  let client = ApiClient::new(base_url)?;

  match args.command {
    Command::Run => {
      let resp = client.run().await?;
      print(args.json, &resp.report, || println!("{}", resp.message))?;
    }
    Command::Recompute => {
      let resp = client.recompute().await?;
      print(args.json, &resp.report, || println!("{}", resp.message))?;
    }
    Command::Ingest { source } => {
      let resp = client.ingest(source.name()).await?;
      println!("{}: {} rows ingested, {} sites rescored", resp.source, resp.rows, resp.sites_scored);
    }
    Command::Calculate { biodiversity, climate, human_pressure, vegetation } => {
      let weights = PartialWeights { biodiversity, climate, human_pressure, vegetation };
      let results = client.calculate(weights).await?;
      print(args.json, &results, || print_ranking(&results))?;
    }
    Command::Status => {
      let status = client.status().await?;
      print(args.json, &status, || print_status(&status))?;
    }
    Command::Sites => {
      let sites = client.sites().await?;
      print(args.json, &sites, || print_sites(&sites))?;
    }
  }

  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print<T: serde::Serialize>(json: bool, value: &T, table: impl FnOnce()) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value).context("serialising output")?);
  } else {
    table();
  }
  Ok(())
}

fn print_ranking(results: &[EhiResult]) {
  println!(
    "{:>4}  {:<32} {:>6}  {:>6} {:>6} {:>6} {:>6}",
    "id", "site", "ehi", "bio", "clim", "press", "veg"
  );
  for r in results {
    let b = &r.breakdown;
    println!(
      "{:>4}  {:<32} {:>6.3}  {:>6.3} {:>6.3} {:>6.3} {:>6.3}",
      r.id, r.name, r.ehi_score, b.biodiversity, b.climate, b.human_pressure, b.vegetation
    );
  }
}

fn print_status(status: &PipelineStatus) {
  let c = &status.store.counts;
  println!("sites           {}", c.sites);
  println!("occurrence      {}", c.occurrence);
  println!("climate         {}", c.climate);
  println!("land_cover      {}", c.land_cover);
  println!("human_pressure  {}", c.human_pressure);
  match status.store.avg_composite_ehi {
    Some(avg) => println!("average EHI     {avg:.3}"),
    None => println!("average EHI     -"),
  }

  match &status.pipeline {
    RunState::Idle => println!("pipeline        idle"),
    RunState::Running { trigger, started_at, .. } => {
      println!("pipeline        running ({trigger:?} since {started_at})")
    }
  }

  if let Some(last) = &status.last_run {
    let outcome = match &last.outcome {
      RunOutcome::Completed { report } => format!("completed, {} sites scored", report.sites_scored),
      RunOutcome::Failed { step: Some(step), error } => format!("failed at {step}: {error}"),
      RunOutcome::Failed { step: None, error } => format!("failed: {error}"),
    };
    println!("last run        {:?} at {}, {outcome}", last.trigger, last.finished_at);
  }
}

fn print_sites(sites: &[Site]) {
  for site in sites {
    let score = site
      .scores
      .map(|s| format!("{:.3}", s.composite_ehi))
      .unwrap_or_else(|| "-".to_string());
    let protected = if site.protected_area { " (protected)" } else { "" };
    println!(
      "{:>4}  {:<32} {:>9.4} {:>8.4}  {score}{protected}",
      site.id, site.name, site.longitude, site.latitude
    );
  }
}
