// Allow dead code for library functions compiled into the binary but only
// exercised through the library crate and its tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod classify;
mod cli;
mod config;
mod crawler;
mod discovery;
mod estimate;
mod export;
mod geocode;
mod installer;
mod links;
mod logger;
mod pipeline;
mod rate_limit;
mod reconcile;
mod store;

use cli::Cli;
use config::{AppConfig, ConfigError};
use logger::{PipelineLogger, VerbosityLevel};
use pipeline::{Pipeline, RunOptions, RunTarget};
use store::JsonFileStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run solarscout again.");
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Load configuration
    let app_config = match AppConfig::load() {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!("✅ Created default configuration file at: {}", created_path.display());
                    println!("   Edit this file to customize settings, then run solarscout again.");
                    return Ok(());
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose);

    let target = match (&cli.location, cli.lat, cli.lon) {
        (Some(location), _, _) => RunTarget::Location(location.clone()),
        (None, Some(lat), Some(lon)) => RunTarget::Coordinates { lat, lon },
        _ => bail!("Specify a discovery center: --location \"City, ST\" or both --lat and --lon"),
    };

    let options = RunOptions {
        target,
        radius_m: cli.radius.unwrap_or(app_config.discovery.default_radius_m),
        enrich: !cli.no_enrich,
        max_runtime: cli.max_runtime_secs.map(std::time::Duration::from_secs),
    };

    let logger = PipelineLogger::new(VerbosityLevel::from_verbose_count(cli.verbose));
    let mut store = JsonFileStore::open(&cli.store)?;
    let mut pipeline = Pipeline::from_config(&app_config)?;

    match pipeline.run(&mut store, &options, &logger).await {
        Ok(report) => {
            print_summary(&report, &cli.store.display().to_string());
            if let Some(output) = &cli.output {
                export::export_report(&report, output)?;
                println!("Report exported: {}", output.display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Run failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "solarscout=warn",
        1 => "solarscout=info",
        _ => "solarscout=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(report: &pipeline::RunReport, store_path: &str) {
    println!("\n=== DISCOVERY SUMMARY ===");
    println!("Candidates Discovered: {}", report.discovered);
    println!("Installers Processed: {}", report.processed);
    println!("Errors: {}", report.errors.len());

    let enriched = report
        .installers
        .iter()
        .filter(|p| p.enrichment.as_ref().map(|e| e.success).unwrap_or(false))
        .count();
    println!("Websites Scanned: {}", enriched);
    println!("Store: {}", store_path);
    println!("=========================\n");

    for error in &report.errors {
        println!("  ⚠ [{}] {}: {}", error.stage, error.subject, error.message);
    }

    if report.processed > 0 {
        println!("✅ Run completed. {} installers up to date.", report.processed);
    } else {
        println!("✅ Run completed. No installers to process.");
    }
}
