//! Command-line parsing for the UCN transmission analysis.
//!
//! Argument parsing stays separate from the reduction code; `app` maps the
//! parsed commands onto the library.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ucn", version, about = "UCN guide transmission data reduction")]
pub struct Cli {
    /// Emit log events as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reduce a JSON-lines cycle file: per-experiment transmission,
    /// comparisons, sweeps, figures and exports.
    Analyze(AnalyzeArgs),
    /// Generate synthetic cycles for the runs of a config.
    Simulate(SimulateArgs),
    /// Convert between He-II temperature (K) and vapor pressure (torr).
    Vapor(VaporArgs),
    /// Write the default analysis config as JSON.
    DefaultConfig(DefaultConfigArgs),
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Cycle records, one JSON object per line.
    #[arg(value_name = "CYCLES")]
    pub input: PathBuf,

    /// Analysis config (experiment table, thresholds, windows).
    #[arg(short, long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Output directory for results, exports and figures.
    #[arg(short, long, default_value = "ucn-out")]
    pub out: PathBuf,

    /// Skip SVG rendering.
    #[arg(long)]
    pub no_figures: bool,

    /// Figure width (px).
    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    /// Figure height (px).
    #[arg(long, default_value_t = 640)]
    pub height: u32,

    /// Print only the comparison and sweep tables.
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Analysis config whose experiment table lists the runs to generate.
    #[arg(short, long, value_name = "JSON")]
    pub config: PathBuf,

    /// Cycles per run.
    #[arg(long, default_value_t = 10)]
    pub cycles: u32,

    /// Random seed (each run derives its own stream from it).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Transmission of an experiment, `ID=VALUE` (repeatable, default 1).
    #[arg(long = "transmission", value_name = "ID=VALUE", value_parser = parse_assignment)]
    pub transmissions: Vec<(String, f64)>,

    /// Source profile overriding the simulation defaults.
    #[arg(long, value_name = "JSON")]
    pub profile: Option<PathBuf>,

    /// Output file (JSON lines).
    #[arg(short, long, default_value = "cycles.jsonl")]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("input").required(true).args(["temperature", "pressure"])))]
pub struct VaporArgs {
    /// Temperature (K).
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Vapor pressure (torr).
    #[arg(short, long)]
    pub pressure: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct DefaultConfigArgs {
    #[arg(short, long, default_value = "ucn-config.json")]
    pub output: PathBuf,
}

/// Parse `ID=VALUE`. The id may itself contain `=`; the last one splits.
pub fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (id, value) = s.rsplit_once('=').ok_or_else(|| format!("expected ID=VALUE, got '{s}'"))?;
    if id.is_empty() {
        return Err(format!("missing id in '{s}'"));
    }
    let value: f64 = value.trim().parse().map_err(|e| format!("invalid value in '{s}': {e}"))?;
    Ok((id.to_string(), value))
}
