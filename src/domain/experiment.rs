//! Per-experiment accumulator.
//!
//! An experiment owns one `CycleEntry` per accepted cycle, in acceptance
//! order. Keeping every per-cycle quantity in a single record makes the
//! "one entry per accepted cycle" invariant structural. After analysis the
//! derived results are attached as `analysis`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ExperimentSpec, TimeWindow, WindowCounts};
use crate::error::AnalysisError;
use crate::hist::Histogram;
use crate::reduce::transmission::TransmissionResult;

/// Everything extracted from one accepted cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleEntry {
    pub run: u32,
    pub cycle: u32,
    pub start: DateTime<Utc>,
    /// All beam current readings (µA).
    pub beam_current: Vec<f64>,

    /// Li6 counts in the counting period.
    pub li6_counting: WindowCounts,
    /// Monitor counts in the counting period.
    pub monitor_counting: WindowCounts,
    /// Li6 counts in the data-positioned secondary window.
    pub li6_secondary: WindowCounts,
    /// Monitor counts in the fixed secondary window (end of irradiation).
    pub monitor_secondary: WindowCounts,
    pub li6_background: WindowCounts,
    pub li6_irradiation: WindowCounts,

    pub min_temperature: f64,
    pub max_temperature: f64,
    pub min_vapor_pressure: f64,
    pub max_vapor_pressure: f64,
    /// Magnet current readings (A).
    pub scm_current: Vec<f64>,

    /// Origin of the Li6 secondary window, if a burst was found.
    pub li6_window: Option<TimeWindow>,

    #[serde(skip)]
    pub li6_rate: Histogram,
    #[serde(skip)]
    pub he3_rate: Histogram,
}

#[derive(Debug, Clone)]
pub struct Experiment {
    pub id: String,
    pub runs: BTreeSet<u32>,
    cycles: Vec<CycleEntry>,
    channels: Histogram,
    pub analysis: Option<TransmissionResult>,
}

impl Experiment {
    pub fn new(spec: &ExperimentSpec, channel_bins: usize) -> Result<Self, AnalysisError> {
        Ok(Self {
            id: spec.id.clone(),
            runs: spec.runs.iter().copied().collect(),
            cycles: Vec::new(),
            channels: Histogram::new(channel_bins, 0.0, channel_bins as f64)?,
            analysis: None,
        })
    }

    pub fn includes_run(&self, run: u32) -> bool {
        self.runs.contains(&run)
    }

    /// Append one accepted cycle and its Li6 channel tags.
    pub fn push(&mut self, entry: CycleEntry, channels: &[u32]) {
        for &c in channels {
            self.channels.fill(c as f64);
        }
        self.cycles.push(entry);
    }

    pub fn cycles(&self) -> &[CycleEntry] {
        &self.cycles
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Channel-tag frequency histogram of all Li6 hits.
    pub fn channels(&self) -> &Histogram {
        &self.channels
    }

    pub fn first_run(&self) -> Option<u32> {
        self.runs.first().copied()
    }

    /// Counts and durations of one window across all cycles.
    pub fn window_series(&self, window: impl Fn(&CycleEntry) -> WindowCounts) -> (Vec<f64>, Vec<f64>) {
        self.cycles
            .iter()
            .map(|c| {
                let w = window(c);
                (w.counts, w.duration)
            })
            .unzip()
    }

    pub fn cycle_numbers(&self) -> Vec<f64> {
        self.cycles.iter().map(|c| c.cycle as f64).collect()
    }
}
