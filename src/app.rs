//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads the analysis config
//! - runs the reduction pipeline or the simulator
//! - prints reports and writes exports/figures

use std::fs::File;
use std::io::BufReader;

use clap::Parser;
use tracing::{Level, info};

use crate::cli::{AnalyzeArgs, Cli, Command, DefaultConfigArgs, SimulateArgs, VaporArgs};
use crate::data::sample::CycleProfile;
use crate::domain::AnalysisConfig;
use crate::error::AppError;
use crate::io::{CycleReader, load_config, write_config, write_cycles};
use crate::report::{ReportStyle, SvgSink};

pub mod pipeline;

/// Entry point for the `ucn` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing(cli.json_logs, log_level(cli.verbose));

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Vapor(args) => handle_vapor(args),
        Command::DefaultConfig(args) => handle_default_config(args),
    }
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn config_or_default(path: Option<&std::path::Path>) -> Result<AnalysisConfig, AppError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(AnalysisConfig::default()),
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = config_or_default(args.config.as_deref())?;
    if config.experiments.is_empty() {
        return Err(AppError::new(2, "The config lists no experiments; pass one with --config."));
    }
    let reader = CycleReader::open(&args.input)?;
    let run = pipeline::run_analysis(reader, &config)?;

    if !args.quiet {
        print!("{}", crate::report::format_read_summary(&run.read));
        println!();
        for ex in &run.experiments {
            println!("{}", crate::report::format_experiment(ex));
        }
        print!("{}", crate::report::format_background(&run.background));
        println!();
    }
    if !run.comparisons.is_empty() {
        println!("{}", crate::report::format_comparisons(&run.comparisons));
    }
    if !run.sweeps.is_empty() {
        print!("{}", crate::report::format_sweeps(&run.sweeps));
    }

    run.write_exports(&args.out)?;
    if !args.no_figures {
        let style = ReportStyle {
            width: args.width,
            height: args.height,
            output_dir: args.out.join("figures"),
            ..ReportStyle::default()
        };
        let mut sink = SvgSink::new(style)?;
        run.render(&mut sink)?;
        info!(pages = sink.pages(), "figures written");
    }
    info!(out = %args.out.display(), "results written");
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = load_config(&args.config)?;
    let profile = match &args.profile {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| AppError::new(2, format!("Failed to open profile '{}': {e}", path.display())))?;
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| AppError::new(2, format!("Invalid profile '{}': {e}", path.display())))?
        }
        None => CycleProfile::default(),
    };
    let cycles = pipeline::simulate_experiments(&config, args.cycles, args.seed, &args.transmissions, &profile);
    write_cycles(&args.output, &cycles)?;
    println!("Wrote {} cycles to {}", cycles.len(), args.output.display());
    Ok(())
}

fn handle_vapor(args: VaporArgs) -> Result<(), AppError> {
    match (args.temperature, args.pressure) {
        (Some(t), _) => {
            let p = crate::physics::vapor_pressure(t)?;
            println!("T = {t:.4} K -> P = {p:.6} torr");
        }
        (None, Some(p)) => {
            let t = crate::physics::temperature(p)?;
            println!("P = {p:.6} torr -> T = {t:.4} K");
        }
        (None, None) => return Err(AppError::new(2, "Pass --temperature or --pressure.")),
    }
    Ok(())
}

fn handle_default_config(args: DefaultConfigArgs) -> Result<(), AppError> {
    write_config(&args.output, &AnalysisConfig::default())?;
    println!("Wrote default config to {}", args.output.display());
    Ok(())
}
