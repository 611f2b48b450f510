//! Raw per-cycle record as delivered by the cycle reader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Detector;

/// One measurement cycle.
///
/// Per-period arrays (`li6_counts`, `he3_counts`, `durations`) are indexed by
/// period number. Slow-control arrays hold every reading taken during the
/// cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub run: u32,
    pub cycle: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,

    pub li6_counts: Vec<u64>,
    pub he3_counts: Vec<u64>,
    /// Period durations (s).
    pub durations: Vec<f64>,
    pub beam_on_duration: f64,
    pub beam_off_duration: f64,

    /// Proton beam current readings (µA).
    pub beam_current: Vec<f64>,
    /// Readings of each isotopic-source temperature sensor (K).
    pub temperatures: Vec<Vec<f64>>,
    /// Low-range vapor pressure gauge (torr).
    pub vapor_pressure_low: Vec<f64>,
    /// High-range vapor pressure gauge (torr).
    pub vapor_pressure_high: Vec<f64>,
    /// Experimental-area vacuum gauge (torr).
    pub vacuum_gauge: Vec<f64>,
    /// Isolation valve "open" status readings.
    pub isolation_valve: Vec<f64>,
    #[serde(default)]
    pub valve0_state: Vec<i32>,
    #[serde(default)]
    pub valve1_state: Vec<i32>,
    /// Superconducting magnet shunt voltages (V).
    #[serde(default)]
    pub scm_voltages: Vec<f64>,

    /// Hit times within the cycle (s).
    pub li6_hits: Vec<f64>,
    /// Channel tag of each Li6 hit.
    #[serde(default)]
    pub li6_channels: Vec<u32>,
    pub he3_hits: Vec<f64>,
}

impl Cycle {
    pub fn counts(&self, detector: Detector) -> &[u64] {
        match detector {
            Detector::Li6 => &self.li6_counts,
            Detector::He3 => &self.he3_counts,
        }
    }

    pub fn hits(&self, detector: Detector) -> &[f64] {
        match detector {
            Detector::Li6 => &self.li6_hits,
            Detector::He3 => &self.he3_hits,
        }
    }

    /// Counts of `detector` in `period`, `None` if the period is missing.
    pub fn period_counts(&self, detector: Detector, period: usize) -> Option<f64> {
        self.counts(detector).get(period).map(|&c| c as f64)
    }

    pub fn period_duration(&self, period: usize) -> Option<f64> {
        self.durations.get(period).copied()
    }

    /// Whole seconds of beam-on plus beam-off time, the span of the
    /// time-of-flight histograms.
    pub fn active_seconds(&self) -> usize {
        (self.beam_on_duration + self.beam_off_duration).floor().max(0.0) as usize
    }

    /// Valves in their expected state: valve 0 open at both readings, valve 1
    /// closed then open.
    pub fn valves_nominal(&self) -> bool {
        self.valve0_state.first() == Some(&1)
            && self.valve0_state.get(1) == Some(&1)
            && self.valve1_state.first() == Some(&0)
            && self.valve1_state.get(1) == Some(&1)
    }
}
