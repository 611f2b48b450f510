//! Static analysis configuration.
//!
//! One immutable `AnalysisConfig` is built at startup (defaults, optionally
//! overridden by a JSON file) and passed by reference through the pipeline.
//! Every section deserializes with defaults so a config file only needs to
//! list what it changes, typically the experiment table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Detector, DetectorBackground, TimeWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Constant background rate per detector.
    pub backgrounds: BTreeMap<Detector, DetectorBackground>,
    pub thresholds: CycleThresholds,
    pub periods: PeriodLayout,
    pub windows: SecondaryWindows,
    pub binning: Binning,
    pub fits: FitWindows,
    /// Time-of-flight range kept in cross-experiment spectra (s).
    pub display_window: TimeWindow,
    /// Experiments with a background rate below this enter the combined
    /// low-background fit (1/s).
    pub low_background_cut: f64,
    pub experiments: Vec<ExperimentSpec>,
    pub comparisons: Vec<Comparison>,
    pub sweeps: Vec<SweepSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut backgrounds = BTreeMap::new();
        backgrounds.insert(Detector::Li6, DetectorBackground::new(2.16, 0.03));
        backgrounds.insert(Detector::He3, DetectorBackground::new(0.0403, 0.0017));
        Self {
            backgrounds,
            thresholds: CycleThresholds::default(),
            periods: PeriodLayout::default(),
            windows: SecondaryWindows::default(),
            binning: Binning::default(),
            fits: FitWindows::default(),
            display_window: TimeWindow::new(60.0, 120.0),
            low_background_cut: 2.7,
            experiments: Vec::new(),
            comparisons: Vec::new(),
            sweeps: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Background of `detector`; a detector missing from the table has none.
    pub fn background(&self, detector: Detector) -> DetectorBackground {
        self.backgrounds
            .get(&detector)
            .copied()
            .unwrap_or(DetectorBackground::new(0.0, 0.0))
    }

    /// Run numbers that are listed by more than one experiment, with the ids
    /// of the experiments that claim them.
    pub fn shared_runs(&self) -> Vec<(u32, Vec<String>)> {
        let mut owners: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for ex in &self.experiments {
            for &run in &ex.runs {
                let ids = owners.entry(run).or_default();
                if !ids.contains(&ex.id) {
                    ids.push(ex.id.clone());
                }
            }
        }
        owners.into_iter().filter(|(_, ids)| ids.len() > 1).collect()
    }
}

/// Cycle acceptance thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleThresholds {
    /// Minimum beam current reading (µA).
    pub min_beam_current: f64,
    /// Maximum standard deviation of the beam current readings (µA).
    pub max_beam_fluctuation: f64,
    /// Vacuum gauge readings strictly inside this band mean the gauge was on.
    pub gauge_active_low: f64,
    pub gauge_active_high: f64,
    /// Counting-period Li6 counts must reach this multiple of the duration.
    pub min_signal_rate: f64,
    /// Background-period Li6 counts must not exceed this multiple of the duration.
    pub max_background_rate: f64,
    /// Minimum monitor counts in the counting period.
    pub min_monitor_counts: f64,
}

impl Default for CycleThresholds {
    fn default() -> Self {
        Self {
            min_beam_current: 0.1,
            max_beam_fluctuation: 0.02,
            gauge_active_low: 1e-7,
            gauge_active_high: 1e-2,
            min_signal_rate: 10.0,
            max_background_rate: 10.0,
            min_monitor_counts: 300.0,
        }
    }
}

/// Indices of the cycle periods used by the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodLayout {
    pub irradiation: usize,
    pub counting: usize,
    pub background: usize,
}

impl Default for PeriodLayout {
    fn default() -> Self {
        Self {
            irradiation: 0,
            counting: 1,
            background: 10,
        }
    }
}

/// Secondary counting windows, relative to the end of irradiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryWindows {
    /// A Li6 bin above this content marks the arrival of the burst.
    pub li6_threshold: f64,
    /// The Li6 window starts this long before the first bin above threshold (s).
    pub li6_offset: f64,
    /// Width of the Li6 window (s).
    pub li6_width: f64,
    /// Fixed monitor window.
    pub he3_window: TimeWindow,
}

impl Default for SecondaryWindows {
    fn default() -> Self {
        Self {
            li6_threshold: 10.0,
            li6_offset: 60.0,
            li6_width: 10.0,
            he3_window: TimeWindow::new(-10.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binning {
    pub li6_bins_per_second: usize,
    pub he3_bins_per_second: usize,
    /// Rebin factor of the normalized Li6 spectra.
    pub normalized_rebin: usize,
    /// Width of the bins of the averaged Li6/He3 rate ratio (s).
    pub ratio_bin_seconds: usize,
    pub channel_bins: usize,
    /// Bins of the Li6 window-origin distribution over `[0, window_origin_max)`.
    pub window_origin_bins: usize,
    pub window_origin_max: f64,
}

impl Default for Binning {
    fn default() -> Self {
        Self {
            li6_bins_per_second: 20,
            he3_bins_per_second: 1,
            normalized_rebin: 4,
            ratio_bin_seconds: 10,
            channel_bins: 10,
            window_origin_bins: 100,
            window_origin_max: 5.0,
        }
    }
}

/// Ranges of the per-experiment model fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitWindows {
    pub saturation: TimeWindow,
    pub li6_decay: TimeWindow,
    /// Time at which the valve to the Li6 detector opens (s).
    pub li6_onset: f64,
    /// Number of multi-start seeds per fit (log-spaced lifetime scalings).
    pub seeds: usize,
    /// Largest lifetime scaling of the multi-start grid.
    pub seed_spread: f64,
}

impl Default for FitWindows {
    fn default() -> Self {
        Self {
            saturation: TimeWindow::new(0.0, 60.0),
            li6_decay: TimeWindow::new(60.0, 180.0),
            li6_onset: 60.0,
            seeds: 3,
            seed_spread: 2.0,
        }
    }
}

/// One experimental configuration and the runs it aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub id: String,
    pub runs: Vec<u32>,
}

/// Target experiment normalized to a reference, both matched by id prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub target: String,
    pub reference: String,
}

/// A magnet-current sweep: experiments `<prefix>_<label>A` normalized to
/// `<prefix>_0A`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub prefix: String,
    pub currents: Vec<String>,
}

impl SweepSpec {
    pub fn experiment_id(&self, current: &str) -> String {
        format!("{}_{}A", self.prefix, current)
    }

    pub fn reference_id(&self) -> String {
        self.experiment_id("0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let c = AnalysisConfig::default();
        assert_eq!(c.background(Detector::Li6), DetectorBackground::new(2.16, 0.03));
        assert_eq!(c.background(Detector::He3), DetectorBackground::new(0.0403, 0.0017));
        assert_eq!(c.thresholds.min_beam_current, 0.1);
        assert_eq!(c.thresholds.max_beam_fluctuation, 0.02);
        assert_eq!(c.thresholds.min_monitor_counts, 300.0);
        assert_eq!(c.windows.li6_offset, 60.0);
        assert_eq!(c.windows.li6_width, 10.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"experiments": [{"id": "18-045", "runs": [964]}],
                       "thresholds": {"min_monitor_counts": 100}}"#;
        let c: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.experiments.len(), 1);
        assert_eq!(c.thresholds.min_monitor_counts, 100.0);
        assert_eq!(c.thresholds.min_beam_current, 0.1);
        assert_eq!(c.periods.background, 10);
    }

    #[test]
    fn shared_runs_are_reported() {
        let mut c = AnalysisConfig::default();
        c.experiments = vec![
            ExperimentSpec { id: "a".into(), runs: vec![1, 2] },
            ExperimentSpec { id: "b".into(), runs: vec![2, 3] },
        ];
        assert_eq!(c.shared_runs(), vec![(2, vec!["a".to_string(), "b".to_string()])]);
    }

    #[test]
    fn sweep_ids() {
        let s = SweepSpec { prefix: "18-065".into(), currents: vec!["25".into()] };
        assert_eq!(s.experiment_id("25"), "18-065_25A");
        assert_eq!(s.reference_id(), "18-065_0A");
    }
}
