//! Shared analysis pipeline used by the `analyze` and `simulate` commands.
//!
//! read cycles -> per-experiment analysis -> run summaries -> comparisons
//! and sweeps -> (exports, figures)
//!
//! The CLI layer only decides where results go.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::data::sample::{CycleProfile, simulate_run};
use crate::domain::{AnalysisConfig, Cycle, CycleEntry, Experiment};
use crate::error::AppError;
use crate::reduce::{
    BackgroundSummary, Normalization, ReadSummary, SweepResult, TransmissionResult, analyze, background_summary,
    current_sweep, monitor_summary, normalize, read_cycles,
};
use crate::report::{
    Figure, FigureSink, background_figures, comparison_figure, experiment_figures, monitor_figure, sweep_figure,
};

/// All computed outputs of one `ucn analyze` run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub read: ReadSummary,
    pub experiments: Vec<Experiment>,
    pub background: BackgroundSummary,
    pub monitor: Vec<(u32, f64)>,
    pub comparisons: Vec<Normalization>,
    pub sweeps: Vec<SweepResult>,
}

/// One experiment in the results document.
#[derive(Debug, Serialize)]
pub struct ExperimentOutput<'a> {
    pub id: &'a str,
    pub runs: Vec<u32>,
    pub cycles: &'a [CycleEntry],
    pub result: Option<&'a TransmissionResult>,
}

/// The results document written as JSON.
#[derive(Debug, Serialize)]
pub struct AnalysisOutput<'a> {
    pub read: ReadSummary,
    pub experiments: Vec<ExperimentOutput<'a>>,
    pub background: &'a BackgroundSummary,
    pub monitor: &'a [(u32, f64)],
    pub comparisons: &'a [Normalization],
    pub sweeps: &'a [SweepResult],
}

/// Empty accumulators for every configured experiment.
pub fn build_experiments(config: &AnalysisConfig) -> Result<Vec<Experiment>, AppError> {
    for (run, ids) in config.shared_runs() {
        warn!(run, experiments = ?ids, "run is listed by more than one experiment; its cycles count for each");
    }
    config
        .experiments
        .iter()
        .map(|spec| Experiment::new(spec, config.binning.channel_bins).map_err(AppError::from))
        .collect()
}

/// Execute the full reduction over a cycle stream.
pub fn run_analysis<I>(cycles: I, config: &AnalysisConfig) -> Result<AnalysisRun, AppError>
where
    I: IntoIterator<Item = Result<Cycle, AppError>>,
{
    let mut experiments = build_experiments(config)?;
    let read = read_cycles(cycles, &mut experiments, config)?;

    for ex in &mut experiments {
        match analyze(ex, config) {
            Ok(result) => ex.analysis = Some(result),
            Err(err) => warn!(experiment = %ex.id, error = %err, "experiment not analyzed"),
        }
    }
    let analyzed = experiments.iter().filter(|ex| ex.analysis.is_some()).count();
    info!(analyzed, configured = experiments.len(), "experiments analyzed");

    let background = background_summary(&experiments, config);
    let monitor = monitor_summary(&experiments);
    let comparisons = config
        .comparisons
        .iter()
        .map(|c| normalize(&experiments, &c.target, &c.reference, config))
        .collect();
    let sweeps = config
        .sweeps
        .iter()
        .map(|s| current_sweep(&experiments, s, config))
        .collect();

    Ok(AnalysisRun {
        read,
        experiments,
        background,
        monitor,
        comparisons,
        sweeps,
    })
}

impl AnalysisRun {
    pub fn output(&self) -> AnalysisOutput<'_> {
        AnalysisOutput {
            read: self.read,
            experiments: self
                .experiments
                .iter()
                .map(|ex| ExperimentOutput {
                    id: &ex.id,
                    runs: ex.runs.iter().copied().collect(),
                    cycles: ex.cycles(),
                    result: ex.analysis.as_ref(),
                })
                .collect(),
            background: &self.background,
            monitor: &self.monitor,
            comparisons: &self.comparisons,
            sweeps: &self.sweeps,
        }
    }

    /// Every page, experiments first, then summaries, comparisons and sweeps.
    pub fn figures(&self) -> Vec<Figure> {
        let mut figures: Vec<Figure> = self
            .experiments
            .iter()
            .filter_map(|ex| Some(experiment_figures(&ex.id, ex.analysis.as_ref()?)))
            .flatten()
            .collect();
        figures.extend(background_figures(&self.background));
        figures.extend(monitor_figure(&self.monitor));
        figures.extend(self.comparisons.iter().filter_map(comparison_figure));
        figures.extend(self.sweeps.iter().filter(|s| !s.points.is_empty()).map(sweep_figure));
        figures
    }

    /// Send every page to `sink`; returns the number of pages.
    pub fn render(&self, sink: &mut dyn FigureSink) -> Result<usize, AppError> {
        let figures = self.figures();
        for figure in &figures {
            sink.render(figure)?;
        }
        Ok(figures.len())
    }

    /// `results.json` and `ratios.csv` in `dir`.
    pub fn write_exports(&self, dir: &Path) -> Result<(), AppError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display())))?;
        crate::io::export::write_results_json(&dir.join("results.json"), &self.output())?;
        crate::io::export::write_ratios_csv(&dir.join("ratios.csv"), &self.comparisons, &self.sweeps)?;
        Ok(())
    }
}

/// Transmission of `id` from `ID=VALUE` overrides (longest matching prefix).
fn transmission_for(id: &str, overrides: &[(String, f64)]) -> f64 {
    overrides
        .iter()
        .filter(|(prefix, _)| id.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|&(_, t)| t)
        .unwrap_or(1.0)
}

/// Magnet current encoded in a sweep experiment id (`<prefix>_<label>A`).
fn sweep_current(id: &str, config: &AnalysisConfig) -> Option<f64> {
    config.sweeps.iter().find_map(|s| {
        s.currents
            .iter()
            .find(|label| s.experiment_id(label) == id)
            .and_then(|label| label.parse().ok())
    })
}

/// Synthetic cycles for every run in the experiment table.
///
/// A run takes the transmission and magnet current of the first experiment
/// that lists it. Each run draws from its own seed derived from `seed`.
pub fn simulate_experiments(
    config: &AnalysisConfig,
    cycles_per_run: u32,
    seed: u64,
    transmissions: &[(String, f64)],
    base: &CycleProfile,
) -> Vec<Cycle> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for ex in &config.experiments {
        let profile = CycleProfile {
            transmission: transmission_for(&ex.id, transmissions),
            scm_current: sweep_current(&ex.id, config).unwrap_or(base.scm_current),
            ..base.clone()
        };
        for &run in &ex.runs {
            if !seen.insert(run) {
                continue;
            }
            out.extend(simulate_run(run, cycles_per_run, &profile, seed.wrapping_add(u64::from(run))));
        }
    }
    info!(runs = seen.len(), cycles = out.len(), "simulated cycles");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Comparison, ExperimentSpec, SweepSpec};
    use crate::report::CollectingSink;

    fn config() -> AnalysisConfig {
        let spec = |id: &str, runs: &[u32]| ExperimentSpec { id: id.into(), runs: runs.to_vec() };
        AnalysisConfig {
            experiments: vec![
                spec("18-045 (reference)", &[964, 965]),
                spec("18-480 (guide under test)", &[1132]),
                spec("18-065_0A", &[2000]),
                spec("18-065_100A", &[2001]),
            ],
            comparisons: vec![
                Comparison { target: "18-480".into(), reference: "18-045".into() },
                Comparison { target: "18-999".into(), reference: "18-045".into() },
            ],
            sweeps: vec![SweepSpec { prefix: "18-065".into(), currents: vec!["0".into(), "100".into()] }],
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn overrides_pick_the_longest_prefix() {
        let o = vec![("18".to_string(), 0.9), ("18-480".to_string(), 0.5)];
        assert_eq!(transmission_for("18-480 (guide)", &o), 0.5);
        assert_eq!(transmission_for("18-045", &o), 0.9);
        assert_eq!(transmission_for("17-001", &o), 1.0);
    }

    #[test]
    fn simulation_covers_each_run_once() {
        let mut c = config();
        c.experiments.push(ExperimentSpec { id: "dup".into(), runs: vec![964] });
        let cycles = simulate_experiments(&c, 2, 1, &[], &CycleProfile::default());
        assert_eq!(cycles.len(), 5 * 2);
        let sweep_cycle = cycles.iter().find(|cy| cy.run == 2001).unwrap();
        let current = sweep_cycle.scm_voltages[0] / crate::reduce::extract::SCM_SHUNT_OHMS;
        assert!((current - 100.0).abs() < 5.0, "{current}");
    }

    #[test]
    fn pipeline_end_to_end() {
        let config = config();
        let cycles = simulate_experiments(&config, 4, 7, &[("18-480".to_string(), 0.5)], &CycleProfile::default());
        let run = run_analysis(cycles.into_iter().map(Ok), &config).unwrap();

        assert_eq!(run.read.accepted, 20);
        assert!(run.experiments.iter().all(|ex| ex.analysis.is_some()));

        let ratio = &run.comparisons[0].ratio;
        assert!((ratio.ratio - 0.5).abs() < 0.1, "{ratio:?}");
        assert!(run.comparisons[1].is_missing());

        assert_eq!(run.sweeps[0].points.len(), 2);
        let zero = &run.sweeps[0].points[0].normalization.ratio;
        assert!((zero.ratio - 1.0).abs() < 1e-12);

        let mut sink = CollectingSink::default();
        let pages = run.render(&mut sink).unwrap();
        assert_eq!(pages, sink.figures.len());
        assert!(sink.names().contains(&"18-065_sweep"));
        assert!(sink.names().iter().any(|n| n.starts_with("18-480 (guide under test)_vs_")));

        let dir = tempfile::tempdir().unwrap();
        run.write_exports(dir.path()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("results.json")).unwrap()).unwrap();
        assert_eq!(json["experiments"].as_array().unwrap().len(), 4);
        assert_eq!(json["read"]["accepted"], 20);
        let csv = std::fs::read_to_string(dir.path().join("ratios.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + 2 + 2);
    }

    #[test]
    fn reader_errors_abort_the_run() {
        let cycles = vec![Err(AppError::new(2, "Invalid cycle record on line 1"))];
        let err = run_analysis(cycles, &config()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
