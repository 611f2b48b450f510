//! Weighted nonlinear least squares with box constraints.
//!
//! Given data points `(x_i, y_i, σ_i)` and a `Model`, we minimize
//!
//! ```text
//! χ² = Σ ((y_i − f(x_i; p)) / σ_i)²
//! ```
//!
//! over the free parameters with Levenberg-Marquardt:
//! - numerical Jacobian (central differences, one-sided at a bound)
//! - every trial step is clamped into the parameter bounds
//! - fixed parameters never move
//!
//! Each seed from `seed_grid` is fitted independently (parallel) and the
//! lowest χ² wins. Standard errors come from the inverse of `JᵀJ` at the
//! optimum and are then passed through `inflate_errors`.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::TimeWindow;
use crate::error::AnalysisError;
use crate::fit::quality::{FitResult, inflate_errors};
use crate::fit::seeds::seed_grid;
use crate::hist::Histogram;
use crate::math::{covariance, solve_least_squares};
use crate::models::Model;

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;
/// Relative step for numerical derivatives.
const DERIV_REL_STEP: f64 = 1e-6;
/// Absolute floor of the derivative step (for parameters near zero).
const DERIV_ABS_STEP: f64 = 1e-9;

/// One observation with its standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    pub sigma: f64,
}

/// Fitting options.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative χ² improvement below which the minimizer stops.
    pub tolerance: f64,
    /// Number of multi-start seeds (1 = recommended guess only).
    pub seeds: usize,
    /// Largest lifetime scaling of the seed grid.
    pub seed_spread: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
            seeds: 1,
            seed_spread: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    values: Vec<f64>,
    chi2: f64,
    iterations: usize,
    converged: bool,
}

/// Bin centers, contents and errors of the bins inside `range` that carry
/// a positive variance.
pub fn points_from_histogram(h: &Histogram, range: Option<TimeWindow>) -> Vec<DataPoint> {
    h.points()
        .filter(|&(x, _, _)| range.is_none_or(|r| x >= r.start && x <= r.end))
        .filter(|&(_, _, e)| e > 0.0)
        .map(|(x, y, sigma)| DataPoint { x, y, sigma })
        .collect()
}

/// Fit `model` to the bins of `h` inside the model's range.
pub fn fit_histogram(model: &Model, h: &Histogram, opts: &FitOptions) -> Result<FitResult, AnalysisError> {
    fit_points(model, &points_from_histogram(h, model.range), opts)
}

/// Fit `model` to `data`.
pub fn fit_points(model: &Model, data: &[DataPoint], opts: &FitOptions) -> Result<FitResult, AnalysisError> {
    let name = model.kind.display_name();
    let fail = |reason: String| AnalysisError::Fit {
        model: name.to_string(),
        reason,
    };

    let data: Vec<DataPoint> = data
        .iter()
        .copied()
        .filter(|p| model.in_range(p.x))
        .filter(|p| p.x.is_finite() && p.y.is_finite() && p.sigma.is_finite() && p.sigma > 0.0)
        .collect();

    let free = model.free_indices();
    if free.is_empty() {
        return Err(fail("no free parameters".to_string()));
    }
    if data.len() < free.len() {
        return Err(fail(format!(
            "{} usable points for {} free parameters",
            data.len(),
            free.len()
        )));
    }

    let seeds = seed_grid(model, opts.seeds, opts.seed_spread);

    // Evaluate each seed independently (parallel).
    let candidates: Vec<Candidate> = seeds
        .par_iter()
        .enumerate()
        .filter_map(|(idx, start)| {
            levenberg_marquardt(model, start.clone(), &data, &free, opts).map(|mut c| {
                c.idx = idx;
                c
            })
        })
        .collect();

    // Deterministic selection: minimum χ², ties broken by seed index.
    let Some(best) = candidates
        .iter()
        .min_by(|a, b| a.chi2.total_cmp(&b.chi2).then(a.idx.cmp(&b.idx)))
    else {
        return Err(fail("χ² is not finite at any starting point".to_string()));
    };

    let (normal, _) = normal_equations(model, &best.values, &data, &free)
        .ok_or_else(|| fail("non-finite Jacobian at the optimum".to_string()))?;
    let cov = covariance(&normal).ok_or_else(|| fail("singular covariance matrix".to_string()))?;

    let mut raw_errors: Vec<f64> = model.params.iter().map(|p| if p.fixed { p.error } else { 0.0 }).collect();
    for (k, &i) in free.iter().enumerate() {
        raw_errors[i] = cov[(k, k)].max(0.0).sqrt();
    }

    debug!(
        model = name,
        chi2 = best.chi2,
        points = data.len(),
        iterations = best.iterations,
        seed = best.idx,
        converged = best.converged,
        "fit finished"
    );

    let result = FitResult {
        model: model.kind,
        names: model.names(),
        values: best.values.clone(),
        errors: raw_errors.clone(),
        raw_errors,
        fixed: model.params.iter().map(|p| p.fixed).collect(),
        chi2: best.chi2,
        ndf: data.len() - free.len(),
        range: model.range,
        iterations: best.iterations,
        converged: best.converged,
    };
    Ok(inflate_errors(&result))
}

fn chi_square(model: &Model, values: &[f64], data: &[DataPoint]) -> Option<f64> {
    let chi2: f64 = data
        .iter()
        .map(|p| {
            let r = (p.y - model.eval(p.x, values)) / p.sigma;
            r * r
        })
        .sum();
    chi2.is_finite().then_some(chi2)
}

/// `(JᵀJ, Jᵀr)` with `J` the σ-weighted model derivatives and `r` the
/// σ-weighted residuals.
fn normal_equations(
    model: &Model,
    values: &[f64],
    data: &[DataPoint],
    free: &[usize],
) -> Option<(DMatrix<f64>, DVector<f64>)> {
    let n = data.len();
    let k = free.len();
    let mut jac = DMatrix::<f64>::zeros(n, k);
    let mut resid = DVector::<f64>::zeros(n);

    for (row, p) in data.iter().enumerate() {
        resid[row] = (p.y - model.eval(p.x, values)) / p.sigma;
    }

    let mut up = values.to_vec();
    let mut down = values.to_vec();
    for (col, &i) in free.iter().enumerate() {
        let param = &model.params[i];
        let v = values[i];
        let h = (v.abs() * DERIV_REL_STEP).max(DERIV_ABS_STEP);
        let hi = (v + h).min(param.upper);
        let lo = (v - h).max(param.lower);
        let span = hi - lo;
        if span <= 0.0 {
            continue;
        }
        up[i] = hi;
        down[i] = lo;
        for (row, p) in data.iter().enumerate() {
            let d = (model.eval(p.x, &up) - model.eval(p.x, &down)) / span;
            jac[(row, col)] = d / p.sigma;
        }
        up[i] = v;
        down[i] = v;
    }

    let normal = jac.transpose() * &jac;
    let gradient = jac.transpose() * resid;
    if normal.iter().chain(gradient.iter()).all(|v| v.is_finite()) {
        Some((normal, gradient))
    } else {
        None
    }
}

fn damped_step(normal: &DMatrix<f64>, gradient: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut damped = normal.clone();
    for i in 0..damped.nrows() {
        let d = normal[(i, i)].max(LAMBDA_MIN);
        damped[(i, i)] += lambda * d;
    }
    solve_least_squares(&damped, gradient)
}

fn levenberg_marquardt(
    model: &Model,
    start: Vec<f64>,
    data: &[DataPoint],
    free: &[usize],
    opts: &FitOptions,
) -> Option<Candidate> {
    let mut values = start;
    let mut chi2 = chi_square(model, &values, data)?;
    let (mut normal, mut gradient) = normal_equations(model, &values, data, free)?;
    let mut lambda = LAMBDA_START;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < opts.max_iterations {
        iterations += 1;

        let trial_chi2 = damped_step(&normal, &gradient, lambda).and_then(|delta| {
            let mut trial = values.clone();
            for (k, &i) in free.iter().enumerate() {
                trial[i] = model.params[i].clamp(values[i] + delta[k]);
            }
            chi_square(model, &trial, data).map(|c| (trial, c))
        });

        match trial_chi2 {
            Some((trial, c)) if c <= chi2 => {
                let improvement = chi2 - c;
                values = trial;
                chi2 = c;
                lambda = (lambda * 0.1).max(LAMBDA_MIN);
                if improvement <= opts.tolerance * chi2 + f64::MIN_POSITIVE {
                    converged = true;
                    break;
                }
                (normal, gradient) = normal_equations(model, &values, data, free)?;
            }
            _ => {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    // No downhill step left at any damping.
                    converged = true;
                    break;
                }
            }
        }
    }

    Some(Candidate {
        idx: 0,
        values,
        chi2,
        iterations,
        converged,
    })
}
