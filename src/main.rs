use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use sanctions_pipeline::config::Config;
use sanctions_pipeline::logging;
use sanctions_pipeline::pipeline::{Pipeline, RunSummary, SourceOutcome};
use sanctions_pipeline::types::{parse_source_list, Source};
use sanctions_pipeline::app::integration_use_case::IntegrationReport;

#[derive(Parser)]
#[command(name = "sanctions_pipeline")]
#[command(about = "UN, EU and US sanctions list ingestion and merge")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, parse and write per-source files
    Collect {
        /// Sources to collect (comma-separated). Available: un, eu, us
        #[arg(long, default_value = "un,eu,us")]
        sources: String,
    },
    /// Merge existing per-source files into the unified dataset
    Integrate {
        #[arg(long, default_value = "un,eu,us")]
        sources: String,
    },
    /// Collect, integrate and write the diagnostic report
    Run {
        #[arg(long, default_value = "un,eu,us")]
        sources: String,
    },
}

fn print_outcomes<'a>(outcomes: impl IntoIterator<Item = (&'a Source, &'a SourceOutcome)>) {
    for (source, outcome) in outcomes {
        match outcome {
            SourceOutcome::Collected {
                records,
                output_file,
                ..
            } => println!("   ✅ {}: {} records -> {}", source, records, output_file.display()),
            SourceOutcome::Failed { stage, error } => {
                println!("   ❌ {}: failed during {}: {}", source, stage, error)
            }
        }
    }
}

fn print_integration(report: &IntegrationReport) {
    println!("\n📊 Integration Results:");
    println!("   Sources loaded: {:?}", report.loaded_sources);
    println!("   Total entries: {}", report.total_entries);
    println!("   Duplicates merged: {}", report.merged_duplicates);
    for (source, count) in &report.by_source {
        println!("   {}: {}", source, count);
    }
    for (entity_type, count) in &report.by_type {
        println!("   {}: {}", entity_type, count);
    }
    if report.degraded {
        println!("   ⚠️  Partial integration: some sources were missing");
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Run {} finished in {:.2}s ({:?})", summary.run_id, summary.elapsed.as_secs_f64(), summary.state);
    print_outcomes(&summary.outcomes);
    if let Some(report) = &summary.integration {
        print_integration(report);
    }
    if let Some(err) = &summary.integration_error {
        println!("   ❌ Integration: {}", err);
    }
    if let Some(path) = &summary.diagnostic_file {
        println!("   Diagnostics: {}", path.display());
    }
}

async fn execute(command: Commands, config: Config) -> Result<bool> {
    match command {
        Commands::Collect { sources } => {
            let sources = parse_source_list(&sources)?;
            println!("🔄 Collecting {:?}...", sources);
            let mut pipeline = Pipeline::new(config)?;
            let outcomes = pipeline.collect_sources(&sources).await;
            print_outcomes(&outcomes);
            Ok(outcomes.values().any(SourceOutcome::is_collected))
        }
        Commands::Integrate { sources } => {
            let sources = parse_source_list(&sources)?;
            println!("🔨 Integrating {:?}...", sources);
            let mut pipeline = Pipeline::new(config)?;
            let report = pipeline.integrate(&sources)?;
            print_integration(&report);
            Ok(true)
        }
        Commands::Run { sources } => {
            let sources = parse_source_list(&sources)?;
            println!("🚀 Running full pipeline for {:?}...", sources);
            let mut pipeline = Pipeline::new(config)?;
            let summary = pipeline.run(&sources).await;
            print_summary(&summary);
            Ok(summary.is_success())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()).context("failed to load configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let _guard = logging::init_logging(&config.log_dir);
    info!("Configuration loaded; output directory {}", config.output_dir.display());

    match execute(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("No usable data was produced");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            println!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
