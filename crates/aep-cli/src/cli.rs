use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aep", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate long-term AEP and its uncertainty by Monte Carlo
    Run {
        #[command(flatten)]
        plant: PlantArgs,
        #[command(flatten)]
        settings: SettingsArgs,
        /// Number of Monte Carlo simulations
        #[arg(long, default_value_t = 100)]
        num_sim: usize,
        /// Reanalysis products to sample from (defaults to every loaded product)
        #[arg(long, value_delimiter = ',')]
        products: Vec<String>,
        /// Result table (Parquet or CSV by extension)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Also write the per-simulation parameter table here
        #[arg(long, value_hint = ValueHint::FilePath)]
        params_out: Option<PathBuf>,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export the aggregated operating table used by the regression
    Table {
        #[command(flatten)]
        plant: PlantArgs,
        #[command(flatten)]
        settings: SettingsArgs,
        /// Output table (Parquet or CSV by extension)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
    /// Engine configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a commented configuration template
    Init {
        #[arg(short, long, default_value = "aep.toml", value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Plant input files.
#[derive(Args, Debug, Clone)]
pub struct PlantArgs {
    /// Revenue meter file (`time`, `energy_kwh`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub meter: PathBuf,
    /// Availability and curtailment file (`time`, `availability_kwh`, `curtailment_kwh`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub curtailment: PathBuf,
    /// Reanalysis product as NAME=PATH; repeat for several products
    #[arg(long = "reanalysis", value_name = "NAME=PATH", required = true)]
    pub reanalysis: Vec<String>,
    /// Plant nameplate capacity in MW
    #[arg(long)]
    pub capacity_mw: Option<f64>,
}

/// Configuration file and the command-line overrides applied on top of it.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Engine configuration (TOML); defaults apply when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
    /// Aggregation resolution: M (monthly) or D (daily)
    #[arg(long)]
    pub time_resolution: Option<String>,
    /// Regression model: lin, gbm, etr or gam
    #[arg(long)]
    pub reg_model: Option<String>,
    /// Use reanalysis temperature as a regression input (Y/N)
    #[arg(long)]
    pub reg_temperature: Option<String>,
    /// Use reanalysis wind direction as regression inputs (Y/N)
    #[arg(long)]
    pub reg_winddirection: Option<String>,
    /// Run simulations on the rayon thread pool
    #[arg(long)]
    pub parallel: bool,
}
