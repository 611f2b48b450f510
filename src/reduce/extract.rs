//! Cycle extraction: screen each raw cycle and append the accepted ones to
//! every experiment that lists its run.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{AnalysisConfig, Cycle, CycleEntry, Detector, Experiment, TimeWindow, WindowCounts};
use crate::error::{AnalysisError, AppError};
use crate::hist::Histogram;
use crate::math::{max_value, min_value};
use crate::reduce::filter::{check_valves, screen_cycle};

/// Shunt resistance of the magnet current readout (ohm).
pub const SCM_SHUNT_OHMS: f64 = 250e-6;

/// Vapor pressure (torr) above which the low-range gauge is saturated.
pub const LOW_RANGE_GAUGE_LIMIT: f64 = 2.0;

/// Totals of one pass over the cycle reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadSummary {
    /// Cycles whose run no experiment lists.
    pub unassigned: usize,
    pub rejected: usize,
    pub accepted: usize,
    /// Experiment entries appended (an accepted cycle may feed several).
    pub entries: usize,
}

/// Consume `cycles` and fill `experiments`.
///
/// Reader errors are fatal; everything else (rejections, extraction
/// failures of a single cycle) is logged and skipped.
pub fn read_cycles<I>(
    cycles: I,
    experiments: &mut [Experiment],
    config: &AnalysisConfig,
) -> Result<ReadSummary, AppError>
where
    I: IntoIterator<Item = Result<Cycle, AppError>>,
{
    let mut summary = ReadSummary::default();

    for cycle in cycles {
        let cycle = cycle?;
        if !experiments.iter().any(|ex| ex.includes_run(cycle.run)) {
            summary.unassigned += 1;
            continue;
        }

        if let Err(reason) = screen_cycle(&cycle, config) {
            warn!(run = cycle.run, cycle = cycle.cycle, %reason, "skipping cycle");
            summary.rejected += 1;
            continue;
        }
        check_valves(&cycle);

        let entry = match extract_entry(&cycle, config) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(run = cycle.run, cycle = cycle.cycle, error = %err, "skipping cycle");
                summary.rejected += 1;
                continue;
            }
        };

        summary.accepted += 1;
        for ex in experiments.iter_mut().filter(|ex| ex.includes_run(cycle.run)) {
            ex.push(entry.clone(), &cycle.li6_channels);
            summary.entries += 1;
        }
    }

    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        unassigned = summary.unassigned,
        entries = summary.entries,
        "read cycles"
    );
    Ok(summary)
}

fn counts_in(hits: &[f64], window: TimeWindow) -> f64 {
    hits.iter().filter(|&&t| window.contains_open(t)).count() as f64
}

fn period(cycle: &Cycle, detector: Detector, index: usize) -> Result<WindowCounts, AnalysisError> {
    let counts = cycle
        .period_counts(detector, index)
        .ok_or(AnalysisError::MissingPeriod { period: index })?;
    let duration = cycle
        .period_duration(index)
        .ok_or(AnalysisError::MissingPeriod { period: index })?;
    Ok(WindowCounts::new(counts, duration))
}

/// Time-of-flight histogram of `detector` hits over the cycle's active time.
pub fn rate_histogram(cycle: &Cycle, detector: Detector, bins_per_second: usize) -> Result<Histogram, AnalysisError> {
    let seconds = cycle.active_seconds();
    if seconds == 0 {
        return Err(AnalysisError::ZeroDuration);
    }
    Histogram::from_samples(
        seconds * bins_per_second,
        0.0,
        seconds as f64,
        cycle.hits(detector).iter().copied(),
    )
}

/// Origin of the Li6 secondary window: the low edge of the first bin above
/// threshold, moved back by the configured offset.
pub fn li6_window(li6_rate: &Histogram, config: &AnalysisConfig) -> Option<TimeWindow> {
    let w = &config.windows;
    let bin = li6_rate.first_bin_above(w.li6_threshold)?;
    let start = li6_rate.low_edge(bin) - w.li6_offset;
    Some(TimeWindow::new(start, start + w.li6_width))
}

/// Build the per-experiment record of one accepted cycle.
pub fn extract_entry(cycle: &Cycle, config: &AnalysisConfig) -> Result<CycleEntry, AnalysisError> {
    let p = &config.periods;
    let li6_rate = rate_histogram(cycle, Detector::Li6, config.binning.li6_bins_per_second)?;
    let he3_rate = rate_histogram(cycle, Detector::He3, config.binning.he3_bins_per_second)?;

    let li6_irradiation = period(cycle, Detector::Li6, p.irradiation)?;
    // Secondary windows are relative to the end of irradiation.
    let irradiation_end = li6_irradiation.duration;

    let window = li6_window(&li6_rate, config);
    let li6_secondary = match window {
        Some(w) => WindowCounts::new(counts_in(&cycle.li6_hits, w.shifted(irradiation_end)), w.width()),
        None => {
            warn!(
                run = cycle.run,
                cycle = cycle.cycle,
                threshold = config.windows.li6_threshold,
                "no Li6 bin above threshold, secondary window is empty"
            );
            WindowCounts::new(0.0, config.windows.li6_width)
        }
    };
    let he3_window = config.windows.he3_window;
    let monitor_secondary = WindowCounts::new(
        counts_in(&cycle.he3_hits, he3_window.shifted(irradiation_end)),
        he3_window.width(),
    );

    let temperatures: Vec<f64> = cycle.temperatures.iter().flatten().copied().collect();
    let min_temperature = min_value(&temperatures).ok_or(AnalysisError::EmptyInput("temperature readings"))?;
    let max_temperature = max_value(&temperatures).ok_or(AnalysisError::EmptyInput("temperature readings"))?;

    let gauge = if max_value(&cycle.vapor_pressure_low).is_some_and(|p| p >= LOW_RANGE_GAUGE_LIMIT) {
        &cycle.vapor_pressure_high
    } else {
        &cycle.vapor_pressure_low
    };
    let min_vapor_pressure = min_value(gauge).ok_or(AnalysisError::EmptyInput("vapor pressure readings"))?;
    let max_vapor_pressure = max_value(gauge).ok_or(AnalysisError::EmptyInput("vapor pressure readings"))?;

    Ok(CycleEntry {
        run: cycle.run,
        cycle: cycle.cycle,
        start: cycle.start,
        beam_current: cycle.beam_current.clone(),
        li6_counting: period(cycle, Detector::Li6, p.counting)?,
        monitor_counting: period(cycle, Detector::He3, p.counting)?,
        li6_secondary,
        monitor_secondary,
        li6_background: period(cycle, Detector::Li6, p.background)?,
        li6_irradiation,
        min_temperature,
        max_temperature,
        min_vapor_pressure,
        max_vapor_pressure,
        scm_current: cycle.scm_voltages.iter().map(|v| v / SCM_SHUNT_OHMS).collect(),
        li6_window: window,
        li6_rate,
        he3_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::nominal_cycle;
    use crate::domain::ExperimentSpec;

    fn experiments(specs: &[(&str, &[u32])]) -> Vec<Experiment> {
        specs
            .iter()
            .map(|(id, runs)| {
                Experiment::new(
                    &ExperimentSpec {
                        id: id.to_string(),
                        runs: runs.to_vec(),
                    },
                    10,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn li6_window_tracks_first_bin_above_threshold() {
        let config = AnalysisConfig::default();
        let mut cycle = nominal_cycle(1, 1);
        // 12 hits in one 50 ms bin starting at 62.35 s
        cycle.li6_hits = vec![62.36; 12];
        let h = rate_histogram(&cycle, Detector::Li6, 20).unwrap();
        let w = li6_window(&h, &config).unwrap();
        assert!((w.start - 2.35).abs() < 1e-9, "{w:?}");
        assert!((w.width() - 10.0).abs() < 1e-9);

        // 10 hits is not strictly above the threshold
        cycle.li6_hits = vec![62.36; 10];
        let h = rate_histogram(&cycle, Detector::Li6, 20).unwrap();
        assert!(li6_window(&h, &config).is_none());
    }

    #[test]
    fn secondary_windows_are_counted_after_irradiation() {
        let config = AnalysisConfig::default();
        let mut cycle = nominal_cycle(1, 1);
        // irradiation 60 s: He3 window is (50, 60), open on both ends
        cycle.he3_hits = vec![49.9, 50.0, 55.0, 59.0, 60.0, 61.0];
        // burst at 62.0 s: Li6 window (2, 12) shifted to (62, 72)
        cycle.li6_hits = [vec![62.01; 11], vec![61.9, 72.5]].concat();
        let entry = extract_entry(&cycle, &config).unwrap();
        assert_eq!(entry.monitor_secondary, WindowCounts::new(2.0, 10.0));
        assert_eq!(entry.li6_secondary.counts, 11.0);
        assert_eq!(entry.li6_rate.bins(), cycle.active_seconds() * 20);
        assert_eq!(entry.he3_rate.bins(), cycle.active_seconds());
    }

    #[test]
    fn high_range_gauge_used_when_low_range_saturates() {
        let config = AnalysisConfig::default();
        let mut cycle = nominal_cycle(1, 1);
        cycle.vapor_pressure_low = vec![1.0, 2.0];
        cycle.vapor_pressure_high = vec![5.0, 7.0];
        let entry = extract_entry(&cycle, &config).unwrap();
        assert_eq!((entry.min_vapor_pressure, entry.max_vapor_pressure), (5.0, 7.0));

        cycle.vapor_pressure_low = vec![1.0, 1.5];
        let entry = extract_entry(&cycle, &config).unwrap();
        assert_eq!((entry.min_vapor_pressure, entry.max_vapor_pressure), (1.0, 1.5));
    }

    #[test]
    fn scm_current_from_shunt_voltage() {
        let mut cycle = nominal_cycle(1, 1);
        cycle.scm_voltages = vec![0.025];
        let entry = extract_entry(&cycle, &AnalysisConfig::default()).unwrap();
        assert!((entry.scm_current[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn cycles_feed_every_experiment_listing_their_run() {
        let config = AnalysisConfig::default();
        let mut exps = experiments(&[("a", &[1]), ("b", &[1, 2]), ("c", &[3])]);
        let mut low_beam = nominal_cycle(2, 2);
        low_beam.beam_current = vec![0.01];
        let input = vec![Ok(nominal_cycle(1, 1)), Ok(low_beam), Ok(nominal_cycle(9, 1))];
        let summary = read_cycles(input, &mut exps, &config).unwrap();
        assert_eq!(
            summary,
            ReadSummary {
                unassigned: 1,
                rejected: 1,
                accepted: 1,
                entries: 2
            }
        );
        assert_eq!(exps[0].len(), 1);
        assert_eq!(exps[1].len(), 1);
        assert!(exps[2].is_empty());
    }

    #[test]
    fn reader_errors_are_fatal() {
        let mut exps = experiments(&[("a", &[1])]);
        let input = vec![Ok(nominal_cycle(1, 1)), Err(AppError::new(2, "bad line"))];
        let err = read_cycles(input, &mut exps, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
