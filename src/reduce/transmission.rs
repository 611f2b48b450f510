//! Per-experiment transmission analysis.
//!
//! Runs once per experiment after all cycles are read. The order is fixed:
//!
//! 1. Li6 background rate from the background periods
//! 2. background-subtracted Li6 irradiation rate per µA of beam
//! 3. monitor-count average, beam and temperature ranges
//! 4. constant fit to the counting-window Li6/monitor ratio → transmission
//! 5. constant fit to the secondary-window ratio → transmission2 (skipped
//!    when any cycle saw no monitor counts there)
//! 6. combined time-of-flight histograms, saturation fit (He3) and
//!    delayed-decay fit (Li6, fixed background)
//! 7. normalized Li6 spectra averaged over cycles, one per window type
//! 8. rate ratios, channel and window-origin distributions
//!
//! The combined histograms of steps 6-8 only take cycles whose histograms
//! share the most common binning. A failure there is logged and leaves
//! `spectra` empty; the scalar results of steps 1-5 are kept.

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::domain::{AnalysisConfig, CycleEntry, Detector, DetectorBackground, Experiment, Measurement, WindowCounts};
use crate::error::AnalysisError;
use crate::fit::{FitOptions, FitResult, fit_constant, fit_histogram};
use crate::hist::Histogram;
use crate::math::{max_value, mean, min_value, std_dev, weighted_mean};
use crate::models::Model;
use crate::physics::temperature;
use crate::reduce::background::{
    background_rate, poisson_errors, subtract_background_and_normalize, subtract_background_and_normalize_rate,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// Source vapor pressure of one cycle, midpoint ± half range (torr).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VaporPoint {
    pub cycle: f64,
    pub pressure: Measurement,
}

/// Everything derived from one experiment.
#[derive(Debug, Clone, Serialize)]
pub struct TransmissionResult {
    pub cycles: usize,
    pub cycle_numbers: Vec<f64>,

    pub background: Measurement,
    /// Li6 rate added during irradiation, per µA (1/s/µA), per cycle.
    pub irradiation_rate: Vec<Measurement>,
    pub monitor_average: Measurement,
    pub beam_current: ValueRange,
    pub temperature: ValueRange,

    /// Li6/monitor ratio of the counting window, per cycle.
    pub counting_ratio: Vec<Measurement>,
    pub transmission_fit: FitResult,
    /// Li6/monitor ratio of the secondary windows, per cycle.
    pub irradiation_ratio: Option<Vec<Measurement>>,
    pub transmission2_fit: Option<FitResult>,

    pub vapor_pressure: Vec<VaporPoint>,
    /// Temperatures at the lowest and highest vapor pressure seen.
    pub temperature_from_pressure: Option<ValueRange>,

    /// Combined and normalized time-of-flight histograms with their fits.
    pub spectra: Option<Spectra>,
    pub channels: Histogram,
    pub window_origins: Histogram,
}

/// Histogram outputs of one experiment.
#[derive(Debug, Clone, Serialize)]
pub struct Spectra {
    /// Cycles that entered the histograms.
    pub cycles: usize,
    pub li6_total: Histogram,
    pub he3_total: Histogram,
    pub saturation_fit: Option<FitResult>,
    pub li6_fit: Option<FitResult>,

    /// Li6 spectrum normalized to the counting-window monitor counts.
    pub normalized_counting: Histogram,
    /// Li6 spectrum normalized to the secondary-window monitor counts.
    pub normalized_irradiation: Option<Histogram>,

    /// Summed Li6 (background-subtracted) over summed He3, 1 s bins.
    pub cumulative_ratio: Histogram,
    /// Per-cycle Li6/He3 rate ratio averaged over cycles.
    pub average_ratio: Histogram,
}

impl TransmissionResult {
    pub fn transmission(&self) -> Measurement {
        self.transmission_fit.measurement(0).unwrap_or(Measurement::ZERO)
    }

    pub fn transmission2(&self) -> Option<Measurement> {
        self.transmission2_fit.as_ref().and_then(|f| f.measurement(0))
    }

    pub fn normalized_counting(&self) -> Option<&Histogram> {
        self.spectra.as_ref().map(|s| &s.normalized_counting)
    }

    pub fn normalized_irradiation(&self) -> Option<&Histogram> {
        self.spectra.as_ref().and_then(|s| s.normalized_irradiation.as_ref())
    }
}

fn fit_options(config: &AnalysisConfig) -> FitOptions {
    FitOptions {
        seeds: config.fits.seeds,
        seed_spread: config.fits.seed_spread,
        ..FitOptions::default()
    }
}

fn range_of(values: impl Iterator<Item = f64>) -> Result<ValueRange, AnalysisError> {
    let v: Vec<f64> = values.collect();
    match (min_value(&v), max_value(&v)) {
        (Some(min), Some(max)) => Ok(ValueRange { min, max }),
        _ => Err(AnalysisError::EmptyInput("value range")),
    }
}

/// Li6 counts of a window divided by monitor counts (with Poisson error).
fn window_ratio(
    ex: &Experiment,
    li6: impl Fn(&CycleEntry) -> WindowCounts,
    monitor: &[f64],
    background: &DetectorBackground,
) -> Result<Vec<Measurement>, AnalysisError> {
    let (counts, durations) = ex.window_series(li6);
    subtract_background_and_normalize(&counts, &durations, background, monitor, &poisson_errors(monitor))
}

/// Per-cycle Li6 spectrum minus flat background, rebinned and divided by a
/// flat `m ± √m`, averaged over cycles.
fn normalized_spectrum(
    cycles: &[&CycleEntry],
    monitor: impl Fn(&CycleEntry) -> f64,
    background: &DetectorBackground,
    rebin: usize,
) -> Result<Histogram, AnalysisError> {
    let per_cycle = cycles
        .iter()
        .map(|c| {
            let h = &c.li6_rate;
            let m = monitor(c);
            let w = h.bin_width();
            let flat = h.uniform_like(background.rate * w, background.error * w);
            let signal = h.subtracted(&flat)?.rebinned(rebin)?;
            signal.divided(&signal.uniform_like(m, m.max(0.0).sqrt()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Histogram::averaged(&per_cycle)
}

/// Cycles whose Li6 and He3 histograms have the most common binning
/// (ties go to the earliest cycle). The others are logged and left out.
fn uniform_binning(cycles: &[CycleEntry]) -> Vec<&CycleEntry> {
    let key = |c: &CycleEntry| (c.li6_rate.bins(), c.he3_rate.bins());
    let mut counts: Vec<((usize, usize), usize)> = Vec::new();
    for c in cycles {
        match counts.iter_mut().find(|(k, _)| *k == key(c)) {
            Some((_, n)) => *n += 1,
            None => counts.push((key(c), 1)),
        }
    }
    let Some(best) = counts
        .iter()
        .enumerate()
        .max_by_key(|&(i, &(_, n))| (n, std::cmp::Reverse(i)))
        .map(|(_, &(k, _))| k)
    else {
        return Vec::new();
    };
    cycles
        .iter()
        .filter(|c| {
            let keep = key(*c) == best;
            if !keep {
                warn!(
                    run = c.run,
                    cycle = c.cycle,
                    li6_bins = c.li6_rate.bins(),
                    expected = best.0,
                    "cycle length differs from the experiment, left out of the combined spectra"
                );
            }
            keep
        })
        .collect()
}

fn build_spectra(
    id: &str,
    cycles: &[&CycleEntry],
    irradiation_usable: bool,
    config: &AnalysisConfig,
    opts: &FitOptions,
) -> Result<Spectra, AnalysisError> {
    let li6_bg = config.background(Detector::Li6);
    let li6_total = Histogram::summed(&cycles.iter().map(|c| c.li6_rate.clone()).collect::<Vec<_>>())?;
    let he3_total = Histogram::summed(&cycles.iter().map(|c| c.he3_rate.clone()).collect::<Vec<_>>())?;

    let saturation_fit = fit_or_warn(id, &Model::saturation(config.fits.saturation), &he3_total, opts);
    let bin_width = li6_total.bin_width();
    let li6_model = Model::li6_decay(
        config.fits.li6_decay,
        config.fits.li6_onset,
        li6_bg.rate * bin_width,
        li6_bg.error * bin_width,
    );
    let li6_fit = fit_or_warn(id, &li6_model, &li6_total, opts);

    // normalized spectra
    let rebin = config.binning.normalized_rebin;
    let normalized_counting = normalized_spectrum(cycles, |c| c.monitor_counting.counts, &li6_bg, rebin)?;
    let normalized_irradiation = if irradiation_usable {
        Some(normalized_spectrum(cycles, |c| c.monitor_secondary.counts, &li6_bg, rebin)?)
    } else {
        None
    };

    // rate ratios
    let b = &config.binning;
    let per_second = rebin_factor(b.li6_bins_per_second, b.he3_bins_per_second)?;
    let flat_total = li6_total.uniform_like(li6_bg.rate * bin_width, li6_bg.error * bin_width);
    let cumulative_ratio = li6_total
        .added_scaled(&flat_total, -(cycles.len() as f64))?
        .rebinned(per_second)?
        .divided(&he3_total)?;

    let per_cycle_ratio = cycles
        .iter()
        .map(|c| {
            let flat = c.li6_rate.uniform_like(li6_bg.rate * bin_width, li6_bg.error * bin_width);
            let li6 = c
                .li6_rate
                .subtracted(&flat)?
                .rebinned(b.li6_bins_per_second * b.ratio_bin_seconds)?;
            let he3 = c.he3_rate.rebinned(b.he3_bins_per_second * b.ratio_bin_seconds)?;
            li6.divided(&he3)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let average_ratio = Histogram::averaged(&per_cycle_ratio)?;

    Ok(Spectra {
        cycles: cycles.len(),
        li6_total,
        he3_total,
        saturation_fit,
        li6_fit,
        normalized_counting,
        normalized_irradiation,
        cumulative_ratio,
        average_ratio,
    })
}

fn rebin_factor(numerator: usize, denominator: usize) -> Result<usize, AnalysisError> {
    if denominator == 0 || numerator % denominator != 0 {
        return Err(AnalysisError::Binning(format!(
            "{numerator} bins per second cannot be merged into {denominator}"
        )));
    }
    Ok(numerator / denominator)
}

fn fit_or_warn(id: &str, model: &Model, h: &Histogram, opts: &FitOptions) -> Option<FitResult> {
    match fit_histogram(model, h, opts) {
        Ok(fit) => Some(fit),
        Err(err) => {
            warn!(experiment = id, error = %err, "fit failed");
            None
        }
    }
}

/// Analyze one experiment.
pub fn analyze(ex: &Experiment, config: &AnalysisConfig) -> Result<TransmissionResult, AnalysisError> {
    let _span = info_span!("experiment", id = %ex.id).entered();
    if ex.is_empty() {
        return Err(AnalysisError::EmptyInput("experiment cycles"));
    }
    let cycles = ex.cycles();
    let li6_bg = config.background(Detector::Li6);
    let opts = fit_options(config);

    // background and irradiation rate
    let (bg_counts, bg_durations) = ex.window_series(|c| c.li6_background);
    let background = background_rate(&bg_counts, &bg_durations)?;
    let beam_mean: Vec<f64> = cycles.iter().map(|c| mean(&c.beam_current).unwrap_or(0.0)).collect();
    let beam_std: Vec<f64> = cycles.iter().map(|c| std_dev(&c.beam_current).unwrap_or(0.0)).collect();
    let (irr_counts, irr_durations) = ex.window_series(|c| c.li6_irradiation);
    let irradiation_rate =
        subtract_background_and_normalize_rate(&irr_counts, &irr_durations, &li6_bg, &beam_mean, &beam_std)?;
    info!(rate = background.value, error = background.error, "Li6 background rate (1/s)");

    // monitor average, weights 1/m
    let (monitor, _) = ex.window_series(|c| c.monitor_counting);
    let weights: Vec<f64> = monitor.iter().map(|&m| if m > 0.0 { 1.0 / m } else { 0.0 }).collect();
    let monitor_average = weighted_mean(&monitor, &weights)
        .map(|(avg, sum_w)| Measurement::new(avg, 1.0 / sum_w.sqrt()))
        .unwrap_or(Measurement::ZERO);

    let beam_current = range_of(cycles.iter().flat_map(|c| c.beam_current.iter().copied()))?;
    let temperature_range = ValueRange {
        min: cycles.iter().map(|c| c.min_temperature).fold(f64::INFINITY, f64::min),
        max: cycles.iter().map(|c| c.max_temperature).fold(f64::NEG_INFINITY, f64::max),
    };
    info!(
        monitor = monitor_average.value,
        monitor_error = monitor_average.error,
        beam_min = beam_current.min,
        beam_max = beam_current.max,
        temperature_min = temperature_range.min,
        temperature_max = temperature_range.max,
        "run conditions"
    );

    // transmission during counting
    let counting_ratio = window_ratio(ex, |c| c.li6_counting, &monitor, &li6_bg)?;
    let transmission_fit = fit_constant(&counting_ratio)?;
    let t = transmission_fit.measurement(0).unwrap_or(Measurement::ZERO);
    info!(ratio = t.value, error = t.error, "Li6-to-He3 ratio during counting");

    // transmission during irradiation
    let (monitor2, _) = ex.window_series(|c| c.monitor_secondary);
    let irradiation_usable = monitor2.iter().all(|&m| m > 0.0);
    let (irradiation_ratio, transmission2_fit) = if irradiation_usable {
        let ratio = window_ratio(ex, |c| c.li6_secondary, &monitor2, &li6_bg)?;
        let fit = match fit_constant(&ratio) {
            Ok(fit) => {
                let t2 = fit.measurement(0).unwrap_or(Measurement::ZERO);
                info!(ratio = t2.value, error = t2.error, "Li6-to-He3 ratio during irradiation");
                Some(fit)
            }
            Err(err) => {
                warn!(error = %err, "no irradiation-normalized transmission");
                None
            }
        };
        (Some(ratio), fit)
    } else {
        let cycle = cycles
            .iter()
            .find(|c| c.monitor_secondary.counts <= 0.0)
            .map(|c| (c.run, c.cycle));
        warn!(
            run = cycle.map(|c| c.0),
            cycle = cycle.map(|c| c.1),
            "no monitor counts in the secondary window, skipping irradiation normalization"
        );
        (None, None)
    };

    // vapor pressure
    let vapor_pressure: Vec<VaporPoint> = cycles
        .iter()
        .map(|c| VaporPoint {
            cycle: c.cycle as f64,
            pressure: Measurement::new(
                (c.max_vapor_pressure + c.min_vapor_pressure) / 2.0,
                (c.max_vapor_pressure - c.min_vapor_pressure) / 2.0,
            ),
        })
        .collect();
    let lowest = cycles.iter().map(|c| c.min_vapor_pressure).fold(f64::INFINITY, f64::min);
    let highest = cycles.iter().map(|c| c.max_vapor_pressure).fold(f64::NEG_INFINITY, f64::max);
    let temperature_from_pressure = match (temperature(lowest), temperature(highest)) {
        (Ok(min), Ok(max)) => Some(ValueRange { min, max }),
        (Err(err), _) | (_, Err(err)) => {
            debug!(error = %err, "vapor pressure outside the temperature conversion range");
            None
        }
    };

    // combined spectra and model fits
    let binned = uniform_binning(cycles);
    let spectra = match build_spectra(&ex.id, &binned, irradiation_usable, config, &opts) {
        Ok(spectra) => Some(spectra),
        Err(err) => {
            warn!(error = %err, "no combined spectra");
            None
        }
    };

    let b = &config.binning;
    let window_origins = Histogram::from_samples(
        b.window_origin_bins,
        0.0,
        b.window_origin_max,
        cycles.iter().filter_map(|c| c.li6_window).map(|w| w.start),
    )?;

    Ok(TransmissionResult {
        cycles: cycles.len(),
        cycle_numbers: ex.cycle_numbers(),
        background,
        irradiation_rate,
        monitor_average,
        beam_current,
        temperature: temperature_range,
        counting_ratio,
        transmission_fit,
        irradiation_ratio,
        transmission2_fit,
        vapor_pressure,
        temperature_from_pressure,
        spectra,
        channels: ex.channels().clone(),
        window_origins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{CycleProfile, simulate_run};
    use crate::domain::ExperimentSpec;
    use crate::reduce::extract::read_cycles;

    fn experiment(run: u32, cycles: u32, transmission: f64, seed: u64) -> Experiment {
        let config = AnalysisConfig::default();
        let spec = ExperimentSpec {
            id: format!("run{run}"),
            runs: vec![run],
        };
        let mut exps = vec![Experiment::new(&spec, config.binning.channel_bins).unwrap()];
        let profile = CycleProfile {
            transmission,
            ..CycleProfile::default()
        };
        let input = simulate_run(run, cycles, &profile, seed).into_iter().map(Ok);
        read_cycles(input, &mut exps, &config).unwrap();
        exps.remove(0)
    }

    #[test]
    fn empty_experiment_is_an_error() {
        let spec = ExperimentSpec { id: "x".into(), runs: vec![1] };
        let ex = Experiment::new(&spec, 10).unwrap();
        let err = analyze(&ex, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err, AnalysisError::EmptyInput("experiment cycles"));
    }

    #[test]
    fn simulated_experiment_yields_all_outputs() {
        let ex = experiment(1000, 4, 1.0, 11);
        assert_eq!(ex.len(), 4);
        let r = analyze(&ex, &AnalysisConfig::default()).unwrap();

        assert_eq!(r.cycles, 4);
        assert_eq!(r.counting_ratio.len(), 4);
        assert_eq!(r.irradiation_rate.len(), 4);
        assert!(r.transmission().value > 0.0);
        assert!(r.transmission2().is_some());
        assert!(r.normalized_irradiation().is_some());

        // background period of pure 2.16/s noise
        assert!((r.background.value - 2.16).abs() < 5.0 * r.background.error.max(0.1));

        // rebinned by 4: 280 s × 20 bins/s / 4
        let spectra = r.spectra.as_ref().unwrap();
        assert_eq!(spectra.cycles, 4);
        assert_eq!(spectra.normalized_counting.bins(), 1400);
        assert_eq!(spectra.cumulative_ratio.bins(), 280);
        assert_eq!(spectra.average_ratio.bins(), 28);
        assert!(spectra.li6_fit.is_some());
        assert_eq!(r.window_origins.bins(), 100);
        assert!(r.window_origins.integral() > 0.0);
        assert_eq!(r.channels.integral(), ex.channels().integral());
    }

    #[test]
    fn missing_secondary_monitor_skips_irradiation_outputs() {
        let config = AnalysisConfig::default();
        let spec = ExperimentSpec { id: "x".into(), runs: vec![5] };
        let mut exps = vec![Experiment::new(&spec, 10).unwrap()];
        let mut cycles = simulate_run(5, 3, &CycleProfile::default(), 3);
        // no He3 hits inside (50, 60) for the second cycle
        cycles[1].he3_hits.retain(|&t| !(t > 50.0 && t < 60.0));
        read_cycles(cycles.into_iter().map(Ok), &mut exps, &config).unwrap();

        let r = analyze(&exps[0], &config).unwrap();
        assert!(r.transmission2_fit.is_none());
        assert!(r.irradiation_ratio.is_none());
        assert!(r.normalized_irradiation().is_none());
        assert!(r.normalized_counting().is_some());
        assert!(r.transmission().value > 0.0);
    }

    #[test]
    fn shorter_cycle_keeps_transmission_and_leaves_spectra() {
        let config = AnalysisConfig::default();
        let spec = ExperimentSpec { id: "x".into(), runs: vec![1000] };
        let mut exps = vec![Experiment::new(&spec, 10).unwrap()];
        let mut cycles = simulate_run(1000, 4, &CycleProfile::default(), 11);
        cycles[3].beam_off_duration -= 1.0;
        read_cycles(cycles.into_iter().map(Ok), &mut exps, &config).unwrap();
        assert_eq!(exps[0].len(), 4);

        let r = analyze(&exps[0], &config).unwrap();
        assert_eq!(r.cycles, 4);
        assert_eq!(r.counting_ratio.len(), 4);
        assert!(r.transmission().value > 0.0);
        assert!(r.transmission2().is_some());

        // the 279 s cycle is left out of the combined histograms
        let spectra = r.spectra.as_ref().unwrap();
        assert_eq!(spectra.cycles, 3);
        assert_eq!(spectra.li6_total.bins(), 280 * 20);
        assert_eq!(spectra.normalized_counting.bins(), 1400);
    }

    #[test]
    fn most_common_binning_wins() {
        let config = AnalysisConfig::default();
        let spec = ExperimentSpec { id: "x".into(), runs: vec![7] };
        let mut exps = vec![Experiment::new(&spec, 10).unwrap()];
        let mut cycles = simulate_run(7, 3, &CycleProfile::default(), 5);
        // the first cycle is the odd one out
        cycles[0].beam_off_duration += 2.0;
        read_cycles(cycles.into_iter().map(Ok), &mut exps, &config).unwrap();
        assert_eq!(exps[0].len(), 3);

        let kept = uniform_binning(exps[0].cycles());
        assert_eq!(kept.iter().map(|c| c.cycle).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn lower_transmission_gives_lower_ratio() {
        let high = analyze(&experiment(1, 4, 1.0, 21), &AnalysisConfig::default()).unwrap();
        let low = analyze(&experiment(2, 4, 0.5, 22), &AnalysisConfig::default()).unwrap();
        let ratio = low.transmission().value / high.transmission().value;
        assert!((ratio - 0.5).abs() < 0.1, "ratio = {ratio}");
    }
}
