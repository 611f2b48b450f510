//! Summaries across experiments: detector background per run, monitor
//! statistics, and magnet-current sweeps.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{AnalysisConfig, Experiment, Measurement, SweepSpec};
use crate::fit::{FitResult, fit_constant};
use crate::math::{mean, std_dev};
use crate::reduce::normalize::{Normalization, find_experiment, normalize};

/// One value attributed to the first run of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunPoint {
    pub experiment: String,
    pub run: u32,
    pub value: Measurement,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackgroundSummary {
    /// Li6 background rate per experiment (1/s).
    pub rates: Vec<RunPoint>,
    /// Constant fit over the experiments below the low-background cut.
    pub low_background_fit: Option<FitResult>,
    /// Added Li6 rate during irradiation, every cycle (1/s/µA).
    pub irradiation_rates: Vec<RunPoint>,
    pub irradiation_fit: Option<FitResult>,
}

fn fit_points(points: &[RunPoint], what: &str) -> Option<FitResult> {
    if points.is_empty() {
        return None;
    }
    let values: Vec<Measurement> = points.iter().map(|p| p.value).collect();
    match fit_constant(&values) {
        Ok(fit) => {
            if let Some(m) = fit.measurement(0) {
                info!(value = m.value, error = m.error, points = points.len(), "{what}");
            }
            Some(fit)
        }
        Err(err) => {
            warn!(error = %err, "{what}: fit failed");
            None
        }
    }
}

/// Li6 background summary over all analyzed experiments.
pub fn background_summary(experiments: &[Experiment], config: &AnalysisConfig) -> BackgroundSummary {
    let mut rates = Vec::new();
    let mut irradiation_rates = Vec::new();
    for ex in experiments {
        let (Some(result), Some(run)) = (ex.analysis.as_ref(), ex.first_run()) else {
            continue;
        };
        if result.background.error > 0.0 {
            rates.push(RunPoint {
                experiment: ex.id.clone(),
                run,
                value: result.background,
            });
        }
        irradiation_rates.extend(result.irradiation_rate.iter().map(|&value| RunPoint {
            experiment: ex.id.clone(),
            run,
            value,
        }));
    }

    let low: Vec<RunPoint> = rates
        .iter()
        .filter(|p| p.value.value < config.low_background_cut)
        .cloned()
        .collect();

    BackgroundSummary {
        low_background_fit: fit_points(&low, "low Li6 background"),
        irradiation_fit: fit_points(&irradiation_rates, "Li6 background added during irradiation"),
        rates,
        irradiation_rates,
    }
}

/// Secondary-window monitor counts of every accepted cycle, by first run.
pub fn monitor_summary(experiments: &[Experiment]) -> Vec<(u32, f64)> {
    experiments
        .iter()
        .filter_map(|ex| Some((ex.first_run()?, ex)))
        .flat_map(|(run, ex)| ex.cycles().iter().map(move |c| (run, c.monitor_secondary.counts)))
        .collect()
}

/// One current setting of a sweep, normalized to zero current.
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub label: String,
    /// Mean magnet current over all readings, error std/√n (A).
    pub current: Measurement,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub prefix: String,
    pub points: Vec<SweepPoint>,
}

/// Mean magnet current of an experiment, `None` without readings.
pub fn mean_scm_current(ex: &Experiment) -> Option<Measurement> {
    let readings: Vec<f64> = ex
        .cycles()
        .iter()
        .flat_map(|c| c.scm_current.iter().copied())
        .collect();
    let m = mean(&readings)?;
    let s = std_dev(&readings)?;
    Some(Measurement::new(m, s / (readings.len() as f64).sqrt()))
}

/// Normalize every current setting of `sweep` to its zero-current run.
/// Settings without a matching experiment are left out.
pub fn current_sweep(experiments: &[Experiment], sweep: &SweepSpec, config: &AnalysisConfig) -> SweepResult {
    let reference = sweep.reference_id();
    let points = sweep
        .currents
        .iter()
        .filter_map(|label| {
            let id = sweep.experiment_id(label);
            let ex = find_experiment(experiments, &id)?;
            let Some(current) = mean_scm_current(ex) else {
                warn!(experiment = %ex.id, "no magnet current readings, skipping sweep point");
                return None;
            };
            Some(SweepPoint {
                label: label.clone(),
                current,
                normalization: normalize(experiments, &id, &reference, config),
            })
        })
        .collect();
    SweepResult {
        prefix: sweep.prefix.clone(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{CycleProfile, simulate_run};
    use crate::domain::ExperimentSpec;
    use crate::reduce::extract::read_cycles;
    use crate::reduce::transmission::analyze;

    fn analyzed(specs: &[(&str, u32, CycleProfile)]) -> Vec<Experiment> {
        let config = AnalysisConfig::default();
        let mut exps: Vec<Experiment> = specs
            .iter()
            .map(|(id, run, _)| {
                Experiment::new(&ExperimentSpec { id: id.to_string(), runs: vec![*run] }, 10).unwrap()
            })
            .collect();
        let cycles = specs
            .iter()
            .flat_map(|(_, run, p)| simulate_run(*run, 2, p, u64::from(*run)));
        read_cycles(cycles.map(Ok), &mut exps, &config).unwrap();
        for ex in &mut exps {
            ex.analysis = Some(analyze(ex, &config).unwrap());
        }
        exps
    }

    #[test]
    fn background_summary_applies_low_background_cut() {
        let noisy = CycleProfile {
            li6_background_rate: 6.0,
            ..CycleProfile::default()
        };
        let exps = analyzed(&[
            ("a", 10, CycleProfile::default()),
            ("b", 20, CycleProfile::default()),
            ("c", 30, noisy),
        ]);
        let s = background_summary(&exps, &AnalysisConfig::default());
        assert_eq!(s.rates.len(), 3);
        assert_eq!(s.rates[2].run, 30);
        let fit = s.low_background_fit.unwrap();
        assert_eq!(fit.ndf, 1);
        assert!((fit.values[0] - 2.16).abs() < 0.5);
        assert_eq!(s.irradiation_rates.len(), 6);
        assert!(s.irradiation_fit.is_some());

        let monitor = monitor_summary(&exps);
        assert_eq!(monitor.len(), 6);
        assert!(monitor.iter().all(|&(_, m)| m > 0.0));
    }

    #[test]
    fn sweep_normalizes_to_zero_current() {
        let at = |amps: f64, t: f64| CycleProfile {
            scm_current: amps,
            transmission: t,
            ..CycleProfile::default()
        };
        let exps = analyzed(&[
            ("18-065_0A", 1054, at(0.0, 1.0)),
            ("18-065_100A", 1057, at(100.0, 0.8)),
        ]);
        let sweep = SweepSpec {
            prefix: "18-065".into(),
            currents: vec!["0".into(), "50".into(), "100".into()],
        };
        let r = current_sweep(&exps, &sweep, &AnalysisConfig::default());
        // 50 A has no experiment
        assert_eq!(r.points.len(), 2);
        assert!((r.points[0].normalization.ratio.ratio - 1.0).abs() < 1e-12);
        let p = &r.points[1];
        assert!((p.current.value - 100.0).abs() < 1.0, "{:?}", p.current);
        assert!(p.current.error < 1.0);
        assert!((p.normalization.ratio.ratio - 0.8).abs() < 0.15);
    }
}
