use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "solarscout")]
#[command(about = "Discovers local solar installers from open geographic data and enriches their profiles")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/solarscout.toml
    #[arg(long)]
    pub init: bool,

    /// Free-text location to center discovery on (geocoded before the run)
    #[arg(short, long, conflicts_with_all = ["lat", "lon"])]
    pub location: Option<String>,

    /// Latitude of the discovery center
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the discovery center
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Discovery radius in meters (hard fair-use cap: 50000)
    #[arg(short, long)]
    pub radius: Option<u32>,

    /// Path to the installer store JSON file
    #[arg(short, long, default_value = "./solarscout-store.json")]
    pub store: PathBuf,

    /// Reconcile discovered candidates only; skip website crawling and
    /// specialty classification
    #[arg(long)]
    pub no_enrich: bool,

    /// Abort the run after this many seconds (checked between installers)
    #[arg(long)]
    pub max_runtime_secs: Option<u64>,

    /// Write the run report to this path (.json or .csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbose logging (-v for detailed progress, -vv for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
