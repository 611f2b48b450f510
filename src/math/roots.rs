//! Bracketed scalar root finding (Brent's method).

/// Why a root search stopped without a root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RootError {
    /// `f(lo)` and `f(hi)` have the same sign.
    NotBracketed { f_lo: f64, f_hi: f64 },
    /// Iteration budget exhausted.
    MaxIterations,
}

/// Find `x` in `[lo, hi]` with `f(x) = 0`.
///
/// Combines bisection with secant and inverse quadratic interpolation; always
/// keeps a sign-changing bracket, so it converges whenever the root is
/// bracketed. `xtol` is the absolute tolerance on `x`.
pub fn brent<F>(f: F, lo: f64, hi: f64, xtol: f64, max_iter: usize) -> Result<f64, RootError>
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (lo, hi);
    let (mut fa, mut fb) = (f(a), f(b));

    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if !(fa.is_finite() && fb.is_finite()) || fa.signum() == fb.signum() {
        return Err(RootError::NotBracketed { f_lo: fa, f_hi: fb });
    }

    let (mut c, mut fc) = (a, fa);
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iter {
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * xtol;
        let m = 0.5 * (c - b);
        if m.abs() <= tol || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * m * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * m * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * m * q - (tol * q).abs()).min((e * q).abs()) {
                e = d;
                d = p / q;
            } else {
                d = m;
                e = m;
            }
        } else {
            d = m;
            e = m;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(m) };
        fb = f(b);
    }

    Err(RootError::MaxIterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_sqrt_two() {
        let root = brent(|x| x * x - 2.0, 0.0, 2.0, 1e-12, 100).unwrap();
        assert!((root - 2f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn rejects_unbracketed_interval() {
        let err = brent(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 100).unwrap_err();
        assert!(matches!(err, RootError::NotBracketed { .. }));
    }

    #[test]
    fn returns_endpoint_roots_exactly() {
        assert_eq!(brent(|x| x - 1.0, 1.0, 3.0, 1e-12, 100).unwrap(), 1.0);
    }
}
