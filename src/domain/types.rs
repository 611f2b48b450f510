//! Shared value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Detector identity.
///
/// - `Li6`: the primary ⁶Li scintillation detector behind the guide under test
/// - `He3`: the ³He monitor detector near the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detector {
    Li6,
    He3,
}

impl Detector {
    pub const ALL: [Detector; 2] = [Detector::Li6, Detector::He3];

    pub fn display_name(self) -> &'static str {
        match self {
            Detector::Li6 => "Li6",
            Detector::He3 => "He3",
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A value with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

impl Measurement {
    pub const ZERO: Measurement = Measurement { value: 0.0, error: 0.0 };

    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    /// `self / other` with first-order error propagation (relative errors
    /// in quadrature). A zero denominator yields `0 ± 0`.
    pub fn divided(self, other: Measurement) -> Measurement {
        if other.value == 0.0 {
            return Measurement::ZERO;
        }
        let value = self.value / other.value;
        let error = ((self.error / other.value).powi(2)
            + (self.value * other.error / (other.value * other.value)).powi(2))
        .sqrt();
        Measurement { value, error }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} +/- {}", self.value, self.error)
    }
}

/// Constant background rate of a detector (1/s) and its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorBackground {
    pub rate: f64,
    pub error: f64,
}

impl DetectorBackground {
    pub fn new(rate: f64, error: f64) -> Self {
        Self { rate, error }
    }
}

/// Integrated counts over a time window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowCounts {
    pub counts: f64,
    pub duration: f64,
}

impl WindowCounts {
    pub fn new(counts: f64, duration: f64) -> Self {
        Self { counts, duration }
    }
}

/// Closed time interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Strict containment, matching how hits on the window edges are counted.
    pub fn contains_open(&self, t: f64) -> bool {
        t > self.start && t < self.end
    }

    pub fn shifted(&self, offset: f64) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }
}
