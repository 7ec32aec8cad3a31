//! Hobart CLI binary.
//!
//! Screens regional universes, builds the weekly portfolio and writes
//! candidates, portfolio, risk and report artifacts.

mod integration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use hobart::{
    AppConfig, PortfolioPipeline, ScreenOutcome,
    data::{PricePanel, PriceSource},
    optimizer::Portfolio,
    output::{ExportFormat, Exporter, ReportBuilder},
    region_tilt,
    risk::{RiskEngine, RiskEngineConfig, RiskReport},
    scoring::RegionCandidates,
};
use indicatif::{ProgressBar, ProgressStyle};
use integration::sources::{self, PriceMode};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: weekly multi-region equity portfolio construction", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ScreenArgs {
    /// Regions to screen, comma separated
    #[arg(long, value_delimiter = ',', default_value = "JP,US")]
    regions: Vec<String>,

    /// As-of date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Output directory (overrides the configuration)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Candidates per region (overrides the configuration)
    #[arg(long)]
    top_n: Option<usize>,

    /// Fetch fresh prices without the cache
    #[arg(long)]
    no_cache: bool,

    /// Skip market data and screen placeholder features
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen regions and write candidate lists
    Candidates(ScreenArgs),

    /// Weekly end-to-end run: candidates, portfolio, risk and report
    Run(ScreenArgs),

    /// Render the Markdown report for a saved portfolio
    Report {
        /// Portfolio JSON written by `run`
        #[arg(long)]
        input: PathBuf,

        /// Candidate JSON files to highlight
        #[arg(long, value_delimiter = ',')]
        candidates: Vec<PathBuf>,

        /// Output directory (overrides the configuration)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Risk metrics over the regional universes
    Risk {
        #[command(flatten)]
        screen: ScreenArgs,

        /// Output format: json, pretty or csv
        #[arg(long, default_value = "pretty")]
        format: ExportFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Candidates(args) => {
            apply_overrides(&mut cfg, &args);
            let as_of = as_of(&args);
            let outcomes = screen(&cfg, &args, as_of).await?;
            write_candidates(&cfg.output_dir, &outcomes, as_of)?;
        }
        Commands::Run(args) => {
            apply_overrides(&mut cfg, &args);
            run_weekly(&cfg, &args).await?;
        }
        Commands::Report {
            input,
            candidates,
            output,
        } => {
            if let Some(dir) = output {
                cfg.output_dir = dir;
            }
            report(&cfg, &input, &candidates).await?;
        }
        Commands::Risk { screen, format } => {
            apply_overrides(&mut cfg, &screen);
            risk(&cfg, &screen, format).await?;
        }
    }

    Ok(())
}

fn apply_overrides(cfg: &mut AppConfig, args: &ScreenArgs) {
    if let Some(dir) = &args.output {
        cfg.output_dir = dir.clone();
    }
    if let Some(top_n) = args.top_n {
        cfg.top_n = top_n;
    }
}

fn as_of(args: &ScreenArgs) -> NaiveDate {
    args.date.unwrap_or_else(|| Local::now().date_naive())
}

fn stamp(as_of: NaiveDate) -> String {
    as_of.format("%Y%m%d").to_string()
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn price_source(cfg: &AppConfig, args: &ScreenArgs) -> Result<std::sync::Arc<dyn PriceSource>> {
    sources::price_source(cfg, PriceMode::from_flags(args.no_cache, args.offline))
        .context("failed to open price source")
}

async fn screen(cfg: &AppConfig, args: &ScreenArgs, as_of: NaiveDate) -> Result<Vec<ScreenOutcome>> {
    let regions = sources::normalize_regions(&args.regions);
    anyhow::ensure!(!regions.is_empty(), "no regions given");
    println!("Regions: {}  Date: {as_of}", regions.join(","));

    let screener = sources::screener(cfg, price_source(cfg, args)?)?;
    let universes = sources::load_universes(&cfg.universe_dir, &regions);

    let pb = spinner(format!("Screening {} region(s)...", regions.len()))?;
    let results = screener.screen_all(universes, as_of, cfg.concurrency).await;
    pb.finish_with_message("Screening complete");

    results
        .into_iter()
        .map(|(region, outcome)| outcome.with_context(|| format!("screening {region} failed")))
        .collect()
}

fn write_candidates(dir: &Path, outcomes: &[ScreenOutcome], as_of: NaiveDate) -> Result<()> {
    for outcome in outcomes {
        let blob = &outcome.candidates;
        let path = dir.join(format!("candidates_{}_{}.json", blob.region, stamp(as_of)));
        blob.export_to_file(&path, ExportFormat::PrettyJson)?;
        println!(
            "candidates saved: {} ({} candidates{})",
            path.display(),
            blob.candidates.len(),
            if outcome.used_dummy_features { ", placeholder features" } else { "" }
        );
    }
    Ok(())
}

async fn run_weekly(cfg: &AppConfig, args: &ScreenArgs) -> Result<()> {
    let as_of = as_of(args);
    let constraints = cfg.constraints().context("invalid constraints")?;

    let outcomes = screen(cfg, args, as_of).await?;
    write_candidates(&cfg.output_dir, &outcomes, as_of)?;

    let regions: Vec<String> = outcomes.iter().map(|o| o.candidates.region.clone()).collect();
    for (region, weight) in region_tilt(&regions) {
        tracing::info!(%region, weight, "macro region tilt");
    }

    let prices = sources::merge_panels(outcomes.iter().map(|o| &o.prices));
    let regional: BTreeMap<String, Option<PricePanel>> = outcomes
        .iter()
        .map(|o| (o.candidates.region.clone(), Some(o.prices.clone())))
        .collect();
    let blobs: Vec<RegionCandidates> = outcomes.into_iter().map(|o| o.candidates).collect();

    let portfolio = PortfolioPipeline::default()
        .optimize(&blobs, prices.as_ref(), &constraints, as_of)
        .context("portfolio optimization failed")?;
    let path = cfg.output_dir.join(format!("portfolio_{}.json", stamp(as_of)));
    portfolio.export_to_file(&path, ExportFormat::PrettyJson)?;
    println!(
        "portfolio saved: {} ({} positions, cash {:.2}%)",
        path.display(),
        portfolio.weights.len(),
        portfolio.cash_weight * 100.0
    );

    let risk = RiskEngine::new(RiskEngineConfig::default()).run(&regional);
    let path = cfg.output_dir.join(format!("risk_{}.json", stamp(as_of)));
    risk.export_to_file(&path, ExportFormat::PrettyJson)?;
    println!("risk saved: {}", path.display());

    write_report(cfg, &portfolio, &blobs).await
}

async fn write_report(cfg: &AppConfig, portfolio: &Portfolio, blobs: &[RegionCandidates]) -> Result<()> {
    let generator = cfg.text_generator()?;
    let report = ReportBuilder::new(portfolio)
        .candidates(blobs)
        .build_with(generator.as_ref())
        .await?;

    let path = cfg.output_dir.join(format!("report_{}.md", stamp(portfolio.as_of)));
    report.write_to(&path)?;
    println!(
        "report saved: {}{}",
        path.display(),
        if report.generated { "" } else { " (template)" }
    );
    Ok(())
}

async fn report(cfg: &AppConfig, input: &Path, candidates: &[PathBuf]) -> Result<()> {
    let raw = fs::read_to_string(input).with_context(|| format!("cannot read {}", input.display()))?;
    let portfolio: Portfolio =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a portfolio", input.display()))?;

    let blobs = candidates
        .iter()
        .map(|path| {
            let raw = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
            serde_json::from_str::<RegionCandidates>(&raw)
                .with_context(|| format!("{} is not a candidate list", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    write_report(cfg, &portfolio, &blobs).await
}

async fn risk(cfg: &AppConfig, args: &ScreenArgs, format: ExportFormat) -> Result<()> {
    let as_of = as_of(args);
    let regions = sources::normalize_regions(&args.regions);
    let prices = price_source(cfg, args)?;

    let pb = spinner(format!("Fetching prices for {} region(s)...", regions.len()))?;
    let mut panels = BTreeMap::new();
    for (region, universe) in sources::load_universes(&cfg.universe_dir, &regions) {
        if universe.is_empty() {
            panels.insert(region, None);
            continue;
        }
        let tickers: Vec<String> = universe.into_iter().map(|c| c.ticker).collect();
        let panel = match prices.price_history(&tickers, cfg.lookback_days).await {
            Ok(history) => Some(history.prices),
            Err(e) => {
                tracing::warn!(%region, error = %e, "price fetch failed");
                None
            }
        };
        panels.insert(region, panel);
    }
    pb.finish_with_message("Prices fetched");

    let report: RiskReport = RiskEngine::new(RiskEngineConfig::default()).run(&panels);
    let path = cfg
        .output_dir
        .join(format!("risk_{}.{}", stamp(as_of), format.extension()));
    report.export_to_file(&path, format)?;
    println!(
        "risk saved: {} ({} tickers)",
        path.display(),
        report.metrics.volatility.len()
    );
    Ok(())
}
