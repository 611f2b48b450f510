//! Linear solves used by the fitter.
//!
//! Every Levenberg-Marquardt iteration solves a small damped normal system
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! and the final covariance is the inverse of `JᵀJ`. Parameter counts are tiny
//! (1-8 free parameters) so SVD is cheap and, unlike Cholesky, degrades
//! gracefully when a parameter is pinned at a bound and its column vanishes.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Pseudo-inverse of a symmetric normal matrix (parameter covariance).
///
/// Singular directions (e.g. a parameter with no influence on the data)
/// come back with zero variance instead of failing the whole fit.
pub fn covariance(normal: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if let Some(inv) = normal.clone().try_inverse() {
        if inv.iter().all(|v| v.is_finite()) {
            return Some(inv);
        }
    }
    normal
        .clone()
        .pseudo_inverse(1e-12)
        .ok()
        .filter(|m| m.iter().all(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_damped_normal_system() {
        // (JᵀJ + λ·diag) δ = Jᵀr with JᵀJ = diag(2, 8), λ = 1
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 16.0]);
        let b = DVector::from_row_slice(&[2.0, 8.0]);
        let delta = solve_least_squares(&a, &b).unwrap();
        assert!((delta[0] - 0.5).abs() < 1e-12);
        assert!((delta[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn covariance_of_diagonal_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 0.25]);
        let cov = covariance(&m).unwrap();
        assert!((cov[(0, 0)] - 0.25).abs() < 1e-12);
        assert!((cov[(1, 1)] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_survives_singular_direction() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        let cov = covariance(&m).unwrap();
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-12);
        assert_eq!(cov[(1, 1)], 0.0);
    }
}
