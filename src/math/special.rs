//! Complementary error function.
//!
//! The saturation model multiplies `erfc(x)` by `exp(4·sqrt(τd/τ))`, so the
//! approximation must have small *relative* error for large arguments, not
//! just small absolute error. We use the Chebyshev-fitted form
//!
//! ```text
//! erfc(x) ≈ t · exp(-x² + P(t)),   t = 1 / (1 + x/2)
//! ```
//!
//! which has fractional error below 1.2e-7 for all x >= 0.

/// `erfc(x)` for any finite or infinite `x`.
pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let z = x.abs();
    if z.is_infinite() {
        return if x > 0.0 { 0.0 } else { 2.0 };
    }
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * (-z * z + poly).exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erfc_reference_values() {
        // erfc(0) = 1, erfc(1) = 0.157299207..., erfc(-1) = 1.842700792...
        assert!((erfc(0.0) - 1.0).abs() < 1e-7);
        assert!((erfc(1.0) - 0.157_299_207_050_285).abs() < 1e-7);
        assert!((erfc(-1.0) - 1.842_700_792_949_715).abs() < 1e-7);
    }

    #[test]
    fn erfc_relative_precision_in_the_tail() {
        // erfc(5) = 1.5374597944280349e-12
        let v = erfc(5.0);
        assert!(((v - 1.537_459_794_428_035e-12) / 1.537_459_794_428_035e-12).abs() < 1e-6);
    }

    #[test]
    fn erfc_limits() {
        assert_eq!(erfc(f64::INFINITY), 0.0);
        assert_eq!(erfc(f64::NEG_INFINITY), 2.0);
        assert!(erfc(f64::NAN).is_nan());
    }
}
