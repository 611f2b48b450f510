//! Poisson background rates and background-subtracted, normalized series.
//!
//! For one element with raw count `c` over duration `d`, background rate
//! `b ± δb` and normalization `m ± δm`:
//!
//! ```text
//! s  = c − b·d                 σs² = c + (δb·d)²
//! r  = s / m                   σr² = (σs/m)² + (s·δm/m²)²
//! ```
//!
//! Elements with `c ≤ 0` are treated as exactly `0 ± 0` (no data in the
//! window) rather than as a negative background-subtracted count.

use crate::domain::{DetectorBackground, Measurement};
use crate::error::AnalysisError;

/// Counting rate `Σc/Σd` with its Poisson error `√Σc/Σd`.
pub fn background_rate(counts: &[f64], durations: &[f64]) -> Result<Measurement, AnalysisError> {
    let total: f64 = counts.iter().sum();
    let time: f64 = durations.iter().sum();
    if time == 0.0 {
        return Err(AnalysisError::ZeroDuration);
    }
    Ok(Measurement::new(total / time, total.max(0.0).sqrt() / time))
}

fn check_len(what: &'static str, left: usize, right: usize) -> Result<(), AnalysisError> {
    if left != right {
        return Err(AnalysisError::LengthMismatch { what, left, right });
    }
    Ok(())
}

/// Background-subtracted counts divided element-wise by `normalization`.
pub fn subtract_background_and_normalize(
    counts: &[f64],
    durations: &[f64],
    background: &DetectorBackground,
    normalization: &[f64],
    normalization_err: &[f64],
) -> Result<Vec<Measurement>, AnalysisError> {
    check_len("durations", counts.len(), durations.len())?;
    check_len("normalization", counts.len(), normalization.len())?;
    check_len("normalization errors", counts.len(), normalization_err.len())?;

    counts
        .iter()
        .zip(durations)
        .zip(normalization.iter().zip(normalization_err))
        .enumerate()
        .map(|(index, ((&c, &d), (&m, &dm)))| {
            if c <= 0.0 {
                return Ok(Measurement::ZERO);
            }
            if m == 0.0 {
                return Err(AnalysisError::ZeroNormalization { index });
            }
            let s = c - background.rate * d;
            let ds = (c + (background.error * d).powi(2)).sqrt();
            let value = s / m;
            let error = ((ds / m).powi(2) + (dm * s / (m * m)).powi(2)).sqrt();
            Ok(Measurement::new(value, error))
        })
        .collect()
}

/// As [`subtract_background_and_normalize`], then divided by each duration.
pub fn subtract_background_and_normalize_rate(
    counts: &[f64],
    durations: &[f64],
    background: &DetectorBackground,
    normalization: &[f64],
    normalization_err: &[f64],
) -> Result<Vec<Measurement>, AnalysisError> {
    let normalized =
        subtract_background_and_normalize(counts, durations, background, normalization, normalization_err)?;
    normalized
        .into_iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (m, &d))| {
            if d == 0.0 {
                if m == Measurement::ZERO {
                    return Ok(m);
                }
                return Err(AnalysisError::ZeroNormalization { index });
            }
            Ok(Measurement::new(m.value / d, m.error / d))
        })
        .collect()
}

/// Poisson errors `√m` of a series of monitor counts.
pub fn poisson_errors(counts: &[f64]) -> Vec<f64> {
    counts.iter().map(|c| c.max(0.0).sqrt()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn background_rate_from_counts() {
        assert_eq!(background_rate(&[0.0], &[10.0]).unwrap(), Measurement::new(0.0, 0.0));
        assert_eq!(background_rate(&[100.0], &[10.0]).unwrap(), Measurement::new(10.0, 1.0));
        let m = background_rate(&[30.0, 70.0], &[4.0, 6.0]).unwrap();
        assert!(close(m.value, 10.0) && close(m.error, 1.0));
    }

    #[test]
    fn background_rate_needs_time() {
        assert_eq!(background_rate(&[5.0], &[0.0]), Err(AnalysisError::ZeroDuration));
        assert_eq!(background_rate(&[], &[]), Err(AnalysisError::ZeroDuration));
    }

    #[test]
    fn non_positive_counts_are_zero_signal() {
        let bg = DetectorBackground::new(100.0, 7.0);
        let out = subtract_background_and_normalize(
            &[0.0, -3.0, 40.0],
            &[10.0, 10.0, 0.1],
            &bg,
            &[1e-9, 0.0, 2.0],
            &[5.0, 5.0, 0.0],
        )
        .unwrap();
        assert_eq!(out[0], Measurement::ZERO);
        assert_eq!(out[1], Measurement::ZERO);
        assert!(close(out[2].value, (40.0 - 10.0) / 2.0));
    }

    #[test]
    fn errors_combine_poisson_background_and_normalization() {
        let bg = DetectorBackground::new(1.0, 0.5);
        let out = subtract_background_and_normalize(&[110.0], &[10.0], &bg, &[50.0], &[5.0]).unwrap();
        let s = 100.0_f64;
        let ds = (110.0f64 + 25.0).sqrt();
        let expected = ((ds / 50.0).powi(2) + (5.0 * s / 2500.0).powi(2)).sqrt();
        assert!(close(out[0].value, 2.0));
        assert!(close(out[0].error, expected));
    }

    #[test]
    fn counting_fixture_with_monitor_normalization() {
        // counts [50, 60, 55] over 10 s, background 5/s exactly, monitor 500 each
        let bg = DetectorBackground::new(5.0, 0.0);
        let counts = [50.0, 60.0, 55.0];
        let durations = [10.0; 3];
        let monitor = [500.0; 3];
        let norm = subtract_background_and_normalize(&counts, &durations, &bg, &monitor, &[0.0; 3]).unwrap();
        let values: Vec<f64> = norm.iter().map(|m| m.value).collect();
        assert!(close(values[0], 0.0) && close(values[1], 0.02) && close(values[2], 0.01));

        let rate = subtract_background_and_normalize_rate(&counts, &durations, &bg, &monitor, &[0.0; 3]).unwrap();
        let values: Vec<f64> = rate.iter().map(|m| m.value).collect();
        assert!(close(values[0], 0.0) && close(values[1], 0.002) && close(values[2], 0.001));
        // first element: zero signal but Poisson error of the raw 50 counts
        assert!(close(rate[0].error, 50f64.sqrt() / 500.0 / 10.0));
    }

    #[test]
    fn counting_fixture_with_unit_normalization() {
        // a normalization of 10 per element reproduces the rates [0, 0.1, 0.05]
        let bg = DetectorBackground::new(5.0, 0.0);
        let rate = subtract_background_and_normalize_rate(
            &[50.0, 60.0, 55.0],
            &[10.0; 3],
            &bg,
            &[10.0; 3],
            &[0.0; 3],
        )
        .unwrap();
        let values: Vec<f64> = rate.iter().map(|m| m.value).collect();
        assert!(close(values[0], 0.0) && close(values[1], 0.1) && close(values[2], 0.05));
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let bg = DetectorBackground::new(0.0, 0.0);
        let err = subtract_background_and_normalize(&[1.0, 2.0], &[1.0], &bg, &[1.0, 1.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::LengthMismatch { what: "durations", .. }));
        let err = subtract_background_and_normalize(&[1.0], &[1.0], &bg, &[0.0], &[0.0]).unwrap_err();
        assert_eq!(err, AnalysisError::ZeroNormalization { index: 0 });
    }
}
