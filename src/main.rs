use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use places_ranker::config::{parse_columns, Config, TransformOverrides};
use places_ranker::logging;
use places_ranker::paths::{ArtifactOverride, ArtifactPaths, PathOverrides};
use places_ranker::pipeline::ingestion::RawFormat;
use places_ranker::pipeline::orchestrator::{
    LoadRankOutcome, PipelineOrchestrator, StageFlags, StageOutcome, StageReport, StageStatus,
    TransformOutcome,
};

#[derive(Parser)]
#[command(name = "places-ranker")]
#[command(about = "Clean scraped place records, load them into SQLite and rank them per category")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file (default: $PLACES_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the raw JSON artifact into the clean CSV
    Transform {
        #[command(flatten)]
        paths: PathArgs,
        #[command(flatten)]
        transform: TransformArgs,
    },
    /// Load the clean CSV into SQLite, rank per category and export the ranked CSV
    Rank {
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Run transform then rank
    Run {
        #[command(flatten)]
        paths: PathArgs,
        #[command(flatten)]
        transform: TransformArgs,
        /// Skip the transform stage; the clean CSV must already exist
        #[arg(long)]
        skip_transform: bool,
        /// Skip the load + ranking stage
        #[arg(long)]
        skip_load: bool,
    },
}

#[derive(Args)]
struct PathArgs {
    /// Explicit path to the raw JSON file
    #[arg(long)]
    raw_path: Option<PathBuf>,
    /// File name for the raw JSON (in the raw data dir)
    #[arg(long)]
    raw_name: Option<String>,
    /// Explicit path to the clean CSV
    #[arg(long)]
    clean_path: Option<PathBuf>,
    /// File name for the clean CSV (in the clean data dir)
    #[arg(long)]
    clean_name: Option<String>,
    /// Explicit path to the SQLite database
    #[arg(long)]
    database_path: Option<PathBuf>,
    /// File name for the SQLite database (in the output dir)
    #[arg(long)]
    database_name: Option<String>,
    /// Explicit path to the ranked CSV
    #[arg(long)]
    ranked_path: Option<PathBuf>,
    /// File name for the ranked CSV (in the output dir)
    #[arg(long)]
    ranked_name: Option<String>,
}

impl PathArgs {
    fn into_overrides(self) -> PathOverrides {
        let artifact = |flag: &str, path: Option<PathBuf>, name: Option<String>| {
            if path.is_some() && name.is_some() {
                warn!("--{flag}-name is ignored because --{flag}-path is provided");
            }
            ArtifactOverride { path, name }
        };
        PathOverrides {
            raw: artifact("raw", self.raw_path, self.raw_name),
            clean: artifact("clean", self.clean_path, self.clean_name),
            database: artifact("database", self.database_path, self.database_name),
            ranked: artifact("ranked", self.ranked_path, self.ranked_name),
        }
    }
}

#[derive(Args)]
struct TransformArgs {
    /// Comma-separated list of columns to save (overrides config)
    #[arg(long)]
    columns: Option<String>,
    /// Value to fill missing ratings (overrides config)
    #[arg(long)]
    default_rating: Option<f64>,
    /// Value to fill missing review counts (overrides config)
    #[arg(long)]
    default_reviews: Option<i64>,
    /// Raw file is a dataset export straight from the scraping provider
    #[arg(long)]
    provider_export: bool,
}

impl TransformArgs {
    fn overrides(&self) -> TransformOverrides {
        TransformOverrides {
            columns: self.columns.as_deref().and_then(parse_columns),
            default_rating: self.default_rating,
            default_user_ratings_total: self.default_reviews,
        }
    }

    fn raw_format(&self) -> RawFormat {
        if self.provider_export {
            RawFormat::ProviderExport
        } else {
            RawFormat::Places
        }
    }
}

fn print_transform(outcome: &TransformOutcome) {
    println!("\n📊 Transform results:");
    println!("   Records: {}", outcome.records);
    println!("   Columns: {}", outcome.columns.join(","));
    if !outcome.missing_columns.is_empty() {
        println!("   ⚠️  Missing columns dropped: {}", outcome.missing_columns.join(","));
    }
    let imputation = &outcome.imputation;
    if imputation.missing_ratings > 0 || imputation.missing_user_ratings_total > 0 {
        println!(
            "   ⚠️  Filled {} null ratings and {} null review counts",
            imputation.missing_ratings, imputation.missing_user_ratings_total
        );
    }
    if imputation.unparseable_ratings > 0 || imputation.unparseable_user_ratings_total > 0 {
        println!(
            "   ⚠️  Replaced {} non-numeric ratings and {} non-numeric review counts",
            imputation.unparseable_ratings, imputation.unparseable_user_ratings_total
        );
    }
    println!("   Clean CSV: {}", outcome.clean_path.display());
}

fn print_load_rank(outcome: &LoadRankOutcome) {
    println!("\n📊 Ranking results:");
    println!("   Rows loaded: {}", outcome.rows_loaded);
    println!("   Categories derived: {}", outcome.categories_derived);
    println!("   Rows ranked: {}", outcome.rows_ranked);
    println!("   SQLite DB: {}", outcome.database_path.display());
    println!("   Ranked CSV: {}", outcome.ranked_path.display());
}

fn print_report(report: &StageReport) {
    match &report.status {
        StageStatus::Skipped => println!("\n⏭️  Skipped {}", report.stage.name()),
        StageStatus::Completed(StageOutcome::Transform(outcome)) => print_transform(outcome),
        StageStatus::Completed(StageOutcome::LoadRank(outcome)) => print_load_rank(outcome),
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let loaded = Config::load(cli.config.as_deref());
    let _guard = logging::init_logging(&loaded.config.logging);
    loaded.log();
    let config = loaded.config;

    match cli.command {
        Commands::Transform { paths, transform } => {
            println!("🔧 Running transform...");
            let paths = ArtifactPaths::resolve(&config.paths, &paths.into_overrides());
            let orchestrator = PipelineOrchestrator::from_config(&config, &transform.overrides())
                .with_raw_format(transform.raw_format());

            let outcome = orchestrator
                .run_transform(&paths.raw, &paths.clean)
                .with_context(|| format!("transform failed for {}", paths.raw.display()))?;
            print_transform(&outcome);
        }
        Commands::Rank { paths } => {
            println!("🏆 Running load + ranking...");
            let paths = ArtifactPaths::resolve(&config.paths, &paths.into_overrides());
            let orchestrator = PipelineOrchestrator::from_config(&config, &TransformOverrides::default());

            let outcome = orchestrator
                .run_load_rank(&paths.clean, &paths.database, &paths.ranked)
                .with_context(|| format!("ranking failed for {}", paths.clean.display()))?;
            print_load_rank(&outcome);
        }
        Commands::Run {
            paths,
            transform,
            skip_transform,
            skip_load,
        } => {
            println!("🚀 Running full pipeline (transform + rank)...");
            let paths = ArtifactPaths::resolve(&config.paths, &paths.into_overrides());
            let orchestrator = PipelineOrchestrator::from_config(&config, &transform.overrides())
                .with_raw_format(transform.raw_format());
            let flags = StageFlags {
                skip_transform,
                skip_load,
            };

            match orchestrator.run(flags, &paths) {
                Ok(reports) => {
                    reports.iter().for_each(print_report);
                    info!("Pipeline finished");
                    println!("\n✅ Pipeline completed successfully");
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    println!("\n❌ Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
