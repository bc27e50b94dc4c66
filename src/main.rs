use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cutout_fetch::config::{LayoutMode, RunConfig};
use cutout_fetch::discover;
use cutout_fetch::plan::WorkGroup;
use cutout_fetch::runner::{self, Runner};

#[derive(Parser, Debug)]
#[command(name = "cutout-fetch")]
#[command(version)]
#[command(about = "Plan and fetch survey image cutouts across parallel worker ranks")]
struct Args {
    /// Metadata layout mode
    #[arg(long, value_enum, default_value = "healpix")]
    mode: Mode,

    /// Production / data release tag
    #[arg(long, default_value = "daily")]
    prod: String,

    /// Root of the metadata tree
    #[arg(long, default_value = ".")]
    data_root: PathBuf,

    /// Root of the cutout output tree
    #[arg(long, default_value = ".")]
    out_root: PathBuf,

    /// Survey to process (healpix mode; repeatable; default all)
    #[arg(long = "survey")]
    surveys: Vec<String>,

    /// Program to process (healpix mode; repeatable; default all)
    #[arg(long = "program")]
    programs: Vec<String>,

    /// Healpix pixel to process (healpix mode; repeatable; default all)
    #[arg(long = "healpix")]
    pixels: Vec<String>,

    /// Tile to process (tile-based modes; repeatable; default all)
    #[arg(long = "tile")]
    tiles: Vec<String>,

    /// Night to process (cumulative/pernight modes; repeatable; default all)
    #[arg(long = "night")]
    nights: Vec<String>,

    /// Number of parallel worker ranks
    #[arg(long, default_value = "1")]
    ranks: usize,

    /// Concurrent fetches per rank
    #[arg(long, default_value = "4")]
    jobs: usize,

    /// Cutout size in pixels
    #[arg(long, default_value = "256")]
    size: u32,

    /// External program invoked once per cutout
    #[arg(long, default_value = "cutout")]
    fetch_program: String,

    /// Refetch cutouts whose output files already exist
    #[arg(long)]
    overwrite: bool,

    /// Print fetch commands without executing them
    #[arg(long)]
    dry_run: bool,

    /// Print the per-rank plan as JSON and exit without fetching
    #[arg(long)]
    plan: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Healpix,
    Cumulative,
    Pernight,
    Perexp,
}

impl From<Mode> for LayoutMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Healpix => LayoutMode::Healpix,
            Mode::Cumulative => LayoutMode::Cumulative,
            Mode::Pernight => LayoutMode::Pernight,
            Mode::Perexp => LayoutMode::Perexp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = RunConfig {
        data_root: args.data_root,
        out_root: args.out_root,
        prod: args.prod,
        mode: args.mode.into(),
        surveys: args.surveys,
        programs: args.programs,
        pixels: args.pixels,
        tiles: args.tiles,
        nights: args.nights,
        ranks: args.ranks,
        jobs: args.jobs,
        cutout_size: args.size,
        fetch_program: args.fetch_program,
        overwrite: args.overwrite,
        dry_run: args.dry_run,
        plan_only: args.plan,
    };

    // Fail fast on malformed mode/filter combinations.
    config.validate()?;

    let groups = discover::discover(&config)?;
    let total: usize = groups.iter().map(WorkGroup::weight).sum();
    if total == 0 {
        tracing::info!("No cutouts left to fetch");
        return Ok(());
    }

    if config.plan_only {
        let report = runner::plan_report(&groups, config.ranks)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let runner = Runner::new(config);
    let summaries = runner.run(groups).await?;

    let completed: usize = summaries.iter().map(|s| s.completed).sum();
    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    tracing::info!(completed, failed, "Run complete");

    // Per-item failures are soft; they are rediscovered on the next run.
    Ok(())
}
