//! Small descriptive statistics helpers.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`); `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn min_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(a) => Some(a.min(v)),
    })
}

pub fn max_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(a) => Some(a.max(v)),
    })
}

/// Weighted mean and the sum of weights.
///
/// Entries with non-finite or non-positive weight are ignored. Returns `None`
/// when no entry carries weight.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<(f64, f64)> {
    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    for (&x, &w) in values.iter().zip(weights) {
        if w.is_finite() && w > 0.0 {
            sum_w += w;
            sum_wx += w * x;
        }
    }
    if sum_w > 0.0 {
        Some((sum_wx / sum_w, sum_w))
    } else {
        None
    }
}
