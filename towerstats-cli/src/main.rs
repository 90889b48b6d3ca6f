mod loader;
mod reports;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use loader::JsonRunSource;
use reports::{
    ReportFormat, SourcesReport, TiersReport, TrendsReport, write_categories_report,
    write_sources_report, write_tiers_report, write_trends_report,
};
use towerstats_analytics::{
    Aggregation, AnalyticsEngine, CategoryId, CategoryRegistry, PeriodDuration, RunFilters,
    RunTypeFilter, SourceAnalysisFilters, TierFilter, TrendAggregation, TrendFilters,
};

#[derive(Debug, Parser)]
#[command(name = "towerstats", version)]
#[command(about = "Source breakdowns, tier statistics and trends from recorded tower-defense runs")]
struct Args {
    /// JSON file of recorded runs
    #[arg(long, global = true)]
    runs: Option<PathBuf>,

    /// JSON file replacing the built-in category table
    #[arg(long, global = true)]
    categories: Option<PathBuf>,

    /// Output report format
    #[arg(long, value_enum, global = true, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Break a category total down into its sources per period
    Sources(SourcesArgs),
    /// Best, percentile and hourly values per tier
    Tiers(TiersArgs),
    /// Fields that moved significantly across recent periods of one tier
    Trends(TrendsArgs),
    /// List the active category table
    Categories,
}

#[derive(Debug, clap::Args)]
struct SourcesArgs {
    /// Category to break down (damage-dealt, coins-earned, enemies-destroyed)
    #[arg(long, default_value = "damage-dealt")]
    category: CategoryId,

    /// Period width (per-run, daily, weekly, monthly, yearly)
    #[arg(long, default_value = "per-run")]
    duration: PeriodDuration,

    /// Number of most recent periods to include
    #[arg(long, default_value_t = 10)]
    quantity: usize,

    /// Run type to include (all, farm, tournament, milestone)
    #[arg(long, default_value = "all")]
    run_type: RunTypeFilter,

    /// Tier to include, or all
    #[arg(long, default_value = "all")]
    tier: TierFilter,
}

#[derive(Debug, clap::Args)]
struct TiersArgs {
    /// Show a single field per tier instead of every field
    #[arg(long)]
    field: Option<String>,

    /// Value to show (max, p50, p75, p90, p99)
    #[arg(long, default_value = "max")]
    aggregation: Aggregation,

    /// Normalize values per hour of real time
    #[arg(long)]
    hourly: bool,

    /// Run type to include (all, farm, tournament, milestone)
    #[arg(long, default_value = "all")]
    run_type: RunTypeFilter,

    /// Tier to include, or all
    #[arg(long, default_value = "all")]
    tier: TierFilter,
}

#[derive(Debug, clap::Args)]
struct TrendsArgs {
    /// Tier to analyze
    #[arg(long)]
    tier: u32,

    /// Period width (per-run, daily, weekly, monthly, yearly)
    #[arg(long, default_value = "per-run")]
    duration: PeriodDuration,

    /// Number of most recent periods in the window
    #[arg(long, default_value_t = 5)]
    quantity: usize,

    /// Minimum absolute percent change to report a field
    #[arg(long, default_value_t = 5.0)]
    threshold: f64,

    /// How multi-run periods collapse (sum, average, min, max)
    #[arg(long, default_value = "sum")]
    aggregation: TrendAggregation,

    /// Run type to include (all, farm, tournament, milestone)
    #[arg(long, default_value = "all")]
    run_type: RunTypeFilter,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let registry = load_categories(args.categories.as_deref())?;
    let mut output_target = OutputTarget::new(args.output.clone())?;
    run(&args, registry, &mut output_target)?;
    output_target.flush_inner()?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn load_categories(path: Option<&Path>) -> Result<CategoryRegistry> {
    let Some(path) = path else {
        return Ok(CategoryRegistry::builtin());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read category table {}", path.display()))?;
    CategoryRegistry::from_json(&json)
        .with_context(|| format!("invalid category table {}", path.display()))
}

fn open_engine(
    args: &Args,
    registry: CategoryRegistry,
) -> Result<AnalyticsEngine<JsonRunSource>> {
    let runs_path = args
        .runs
        .as_deref()
        .context("--runs <PATH> is required for this command")?;
    Ok(AnalyticsEngine::new(JsonRunSource::new(runs_path), registry))
}

fn load_context(args: &Args) -> String {
    match &args.runs {
        Some(path) => format!("failed to load runs from {}", path.display()),
        None => "failed to load runs".to_string(),
    }
}

fn run(args: &Args, registry: CategoryRegistry, out: &mut dyn Write) -> Result<()> {
    match &args.command {
        Command::Sources(cmd) => {
            let engine = open_engine(args, registry)?;
            let filters = SourceAnalysisFilters {
                run_type: cmd.run_type,
                tier: cmd.tier,
                duration: cmd.duration,
                quantity: cmd.quantity,
            };
            let data = engine
                .source_analysis(cmd.category, &filters)
                .with_context(|| load_context(args))?;
            let report = SourcesReport {
                category: cmd.category,
                definition: engine.categories().get(cmd.category),
                filters: &filters,
                data: &data,
            };
            write_sources_report(out, args.report, &report)
        }
        Command::Tiers(cmd) => {
            let engine = open_engine(args, registry)?;
            let filters = RunFilters {
                run_type: cmd.run_type,
                tier: cmd.tier,
            };
            let tiers = engine.tier_stats(&filters).with_context(|| load_context(args))?;
            let report = TiersReport {
                filters: &filters,
                field: cmd.field.as_deref(),
                aggregation: cmd.aggregation,
                hourly: cmd.hourly,
                tiers: &tiers,
            };
            write_tiers_report(out, args.report, &report)
        }
        Command::Trends(cmd) => {
            let engine = open_engine(args, registry)?;
            let filters = TrendFilters {
                tier: cmd.tier,
                run_type: cmd.run_type,
                duration: cmd.duration,
                quantity: cmd.quantity,
                change_threshold: cmd.threshold,
                aggregation: cmd.aggregation,
            };
            let analysis = engine.tier_trends(&filters).with_context(|| load_context(args))?;
            let report = TrendsReport {
                filters: &filters,
                analysis: &analysis,
            };
            write_trends_report(out, args.report, &report)
        }
        Command::Categories => write_categories_report(out, args.report, &registry),
    }
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
