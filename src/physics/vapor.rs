//! ⁴He saturated vapor pressure ↔ temperature.
//!
//! Pressure follows the empirical fit of Clement, Logan & Gaffney,
//! Phys. Rev. 100, 743 (1955), in torr. The inverse is found with Brent's
//! method on the same validity range.

use crate::error::AnalysisError;
use crate::math::{RootError, brent};

/// Lowest temperature (K) covered by the fit.
pub const T_MIN: f64 = 0.66;
/// Highest temperature (K) covered by the fit.
pub const T_MAX: f64 = 5.2;

const I: f64 = 4.6202;
const A: f64 = 6.399;
const B: f64 = 2.541;
const C: f64 = 0.00612;
const D: f64 = 0.5197;
const SMALL_A: f64 = 7.0;
const SMALL_B: f64 = 14.14;

const SOLVER_XTOL: f64 = 1e-12;
const SOLVER_MAX_ITER: usize = 200;

/// Vapor pressure (torr) at temperature `t` (K).
pub fn vapor_pressure(t: f64) -> Result<f64, AnalysisError> {
    if !(T_MIN..=T_MAX).contains(&t) {
        return Err(AnalysisError::Domain {
            temperature: t,
            min: T_MIN,
            max: T_MAX,
        });
    }
    let b2 = SMALL_B * SMALL_B + 1.0;
    let x = SMALL_A * t - SMALL_B;
    let ln_p = I - A / t + B * t.ln() + C / 2.0 * t * t
        - D * (SMALL_A * SMALL_B / b2 - 1.0 / t) * x.atan()
        - SMALL_A * D / 2.0 / b2 * (t * t / (1.0 + x * x)).ln();
    Ok(ln_p.exp())
}

/// Temperature (K) at which the vapor pressure equals `p` (torr).
///
/// `p = 0` maps to `T = 0` exactly.
pub fn temperature(p: f64) -> Result<f64, AnalysisError> {
    if p == 0.0 {
        return Ok(0.0);
    }
    let convergence = || AnalysisError::Convergence {
        pressure: p,
        min: T_MIN,
        max: T_MAX,
    };
    let residual = |t: f64| vapor_pressure(t).map(|v| v - p).unwrap_or(f64::NAN);
    brent(residual, T_MIN, T_MAX, SOLVER_XTOL, SOLVER_MAX_ITER).map_err(|e| match e {
        RootError::NotBracketed { .. } | RootError::MaxIterations => convergence(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boiling_point_is_near_one_atmosphere() {
        let p = vapor_pressure(4.2).unwrap();
        assert!((p - 760.0).abs() < 15.0, "P(4.2 K) = {p}");
    }

    #[test]
    fn outside_validity_range_is_a_domain_error() {
        assert!(matches!(vapor_pressure(0.5), Err(AnalysisError::Domain { .. })));
        assert!(matches!(vapor_pressure(6.0), Err(AnalysisError::Domain { .. })));
    }

    #[test]
    fn zero_pressure_is_zero_temperature() {
        assert_eq!(temperature(0.0).unwrap(), 0.0);
    }

    #[test]
    fn unbracketed_pressure_fails_to_converge() {
        assert!(matches!(temperature(1e6), Err(AnalysisError::Convergence { .. })));
        assert!(matches!(temperature(-1.0), Err(AnalysisError::Convergence { .. })));
    }

    #[test]
    fn pressure_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=100 {
            let t = T_MIN + (T_MAX - T_MIN) * i as f64 / 100.0;
            let p = vapor_pressure(t).unwrap();
            assert!(p > last);
            last = p;
        }
    }

    proptest! {
        #[test]
        fn temperature_inverts_vapor_pressure(t in T_MIN..=T_MAX) {
            let p = vapor_pressure(t).unwrap();
            let back = temperature(p).unwrap();
            prop_assert!((back - t).abs() < 1e-8, "T = {t}, back = {back}");
        }
    }
}
