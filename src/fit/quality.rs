//! Fit results and the chi-square error inflation rule.

use serde::{Deserialize, Serialize};

use crate::domain::{Measurement, TimeWindow};
use crate::models::ModelKind;

/// Outcome of fitting one model to one data series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub names: Vec<String>,
    pub values: Vec<f64>,
    /// Reported standard errors (after inflation).
    pub errors: Vec<f64>,
    /// Standard errors straight from the covariance matrix.
    pub raw_errors: Vec<f64>,
    pub fixed: Vec<bool>,
    pub chi2: f64,
    pub ndf: usize,
    pub range: Option<TimeWindow>,
    pub iterations: usize,
    pub converged: bool,
}

impl FitResult {
    /// `chi2 / ndf`, `None` without degrees of freedom.
    pub fn reduced_chi2(&self) -> Option<f64> {
        if self.ndf == 0 {
            None
        } else {
            Some(self.chi2 / self.ndf as f64)
        }
    }

    pub fn measurement(&self, index: usize) -> Option<Measurement> {
        Some(Measurement::new(*self.values.get(index)?, *self.errors.get(index)?))
    }

    pub fn param(&self, name: &str) -> Option<Measurement> {
        let i = self.names.iter().position(|n| n == name)?;
        self.measurement(i)
    }
}

/// Scale reported errors of the floated parameters by the reduced chi-square
/// when it exceeds 1; otherwise report the raw errors.
///
/// Fixed parameters keep their externally supplied error.
pub fn inflate_errors(fit: &FitResult) -> FitResult {
    let factor = match fit.reduced_chi2() {
        Some(r) if r.is_finite() && r > 1.0 => r,
        _ => 1.0,
    };
    let mut out = fit.clone();
    out.errors = fit
        .raw_errors
        .iter()
        .zip(&fit.fixed)
        .map(|(&e, &fixed)| if fixed { e } else { e * factor })
        .collect();
    out
}
