//! Order-0 polynomial fit.
//!
//! The least-squares constant through points with errors `σ_i` is the
//! inverse-variance weighted mean, so no iteration is needed:
//!
//! ```text
//! c = Σ(y_i/σ_i²) / Σ(1/σ_i²),   σ_c = 1/sqrt(Σ 1/σ_i²)
//! ```

use crate::domain::Measurement;
use crate::error::AnalysisError;
use crate::fit::quality::{FitResult, inflate_errors};
use crate::models::ModelKind;

/// Fit a constant to `points`, skipping points without a positive error.
pub fn fit_constant(points: &[Measurement]) -> Result<FitResult, AnalysisError> {
    let usable: Vec<Measurement> = points
        .iter()
        .copied()
        .filter(|p| p.value.is_finite() && p.error.is_finite() && p.error > 0.0)
        .collect();
    if usable.is_empty() {
        return Err(AnalysisError::Fit {
            model: ModelKind::Constant.display_name().to_string(),
            reason: format!("none of {} points has a positive error", points.len()),
        });
    }

    let (sum_w, sum_wy) = usable.iter().fold((0.0, 0.0), |(sw, swy), p| {
        let w = 1.0 / (p.error * p.error);
        (sw + w, swy + w * p.value)
    });
    let value = sum_wy / sum_w;
    let chi2 = usable
        .iter()
        .map(|p| ((p.value - value) / p.error).powi(2))
        .sum();

    let fit = FitResult {
        model: ModelKind::Constant,
        names: vec!["R".to_string()],
        values: vec![value],
        errors: vec![1.0 / sum_w.sqrt()],
        raw_errors: vec![1.0 / sum_w.sqrt()],
        fixed: vec![false],
        chi2,
        ndf: usable.len() - 1,
        range: None,
        iterations: 0,
        converged: true,
    };
    Ok(inflate_errors(&fit))
}
