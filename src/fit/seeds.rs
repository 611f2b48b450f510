//! Multi-start seed generation.
//!
//! Bounded nonlinear fits of multi-exponential models have local minima, so
//! each fit is started from a small deterministic grid of initial guesses:
//! the recommended guess itself, then copies with every lifetime-like
//! parameter scaled by log-spaced factors in `[1/spread, spread]`.

use crate::models::{Model, ParamRole};

/// Scale factors `spread^(2i/(steps-1) - 1)` for `i` in `0..steps`: from
/// `1/spread` to `spread`, evenly spaced in log, symmetric about 1.
fn scalings(spread: f64, steps: usize) -> impl Iterator<Item = f64> {
    let last = steps.saturating_sub(1).max(1) as f64;
    (0..steps).map(move |i| spread.powf(2.0 * i as f64 / last - 1.0))
}

/// Initial parameter vectors for a multi-start fit.
///
/// The first entry is always the model's own initial guess, so ties in the
/// final selection resolve in its favour.
pub fn seed_grid(model: &Model, steps: usize, spread: f64) -> Vec<Vec<f64>> {
    let base = model.values();
    let has_lifetime = model
        .params
        .iter()
        .any(|p| p.role == ParamRole::Lifetime && !p.fixed);
    if steps <= 1 || !has_lifetime || !(spread.is_finite() && spread > 1.0) {
        return vec![base];
    }

    let mut out = vec![base.clone()];
    for factor in scalings(spread, steps) {
        if (factor - 1.0).abs() < 1e-9 {
            continue;
        }
        let seed: Vec<f64> = model
            .params
            .iter()
            .zip(&base)
            .map(|(p, &v)| {
                if p.role == ParamRole::Lifetime && !p.fixed {
                    p.clamp(v * factor)
                } else {
                    v
                }
            })
            .collect();
        if seed != base {
            out.push(seed);
        }
    }
    out
}
