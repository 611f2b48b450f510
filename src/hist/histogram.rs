//! Fixed-width 1D histogram with per-bin variance.
//!
//! `Histogram` is a value type: combination operators (`added`,
//! `subtracted`, `rebinned`, `divided`, ...) return new instances and never
//! touch their inputs. Only `fill` mutates, and it is meant for the
//! construction phase.
//!
//! Variance rules:
//! - addition / subtraction of independent histograms: variances add
//! - scaling by `k`: variance scales by `k²`
//! - division: relative variances add, `σ² = (σ1²·c2² + σ2²·c1²) / c2⁴`;
//!   bins with a zero denominator become `0 ± 0`
//! - rebinning: content and variance of merged bins add

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Relative tolerance when comparing axis limits of two histograms.
const AXIS_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    x_min: f64,
    x_max: f64,
    contents: Vec<f64>,
    variances: Vec<f64>,
}

impl Histogram {
    /// Empty histogram with `bins` equal-width bins over `[x_min, x_max)`.
    pub fn new(bins: usize, x_min: f64, x_max: f64) -> Result<Self, AnalysisError> {
        if bins == 0 {
            return Err(AnalysisError::Binning("histogram needs at least one bin".to_string()));
        }
        if !(x_min.is_finite() && x_max.is_finite() && x_max > x_min) {
            return Err(AnalysisError::Binning(format!(
                "invalid axis range [{x_min}, {x_max})"
            )));
        }
        Ok(Self {
            x_min,
            x_max,
            contents: vec![0.0; bins],
            variances: vec![0.0; bins],
        })
    }

    /// Histogram of unit-weight samples; variance equals content (Poisson).
    pub fn from_samples(
        bins: usize,
        x_min: f64,
        x_max: f64,
        samples: impl IntoIterator<Item = f64>,
    ) -> Result<Self, AnalysisError> {
        let mut h = Self::new(bins, x_min, x_max)?;
        for x in samples {
            h.fill(x);
        }
        Ok(h)
    }

    /// Every bin holds `value ± error`.
    pub fn uniform(
        bins: usize,
        x_min: f64,
        x_max: f64,
        value: f64,
        error: f64,
    ) -> Result<Self, AnalysisError> {
        let mut h = Self::new(bins, x_min, x_max)?;
        h.contents.fill(value);
        h.variances.fill(error * error);
        Ok(h)
    }

    /// Same binning as `self`, every bin `value ± error`.
    pub fn uniform_like(&self, value: f64, error: f64) -> Self {
        Self {
            x_min: self.x_min,
            x_max: self.x_max,
            contents: vec![value; self.bins()],
            variances: vec![error * error; self.bins()],
        }
    }

    /// Add one unit-weight entry. Out-of-range values are dropped.
    pub fn fill(&mut self, x: f64) {
        if let Some(i) = self.find_bin(x) {
            self.contents[i] += 1.0;
            self.variances[i] += 1.0;
        }
    }

    pub fn bins(&self) -> usize {
        self.contents.len()
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.bins() as f64
    }

    pub fn low_edge(&self, bin: usize) -> f64 {
        self.x_min + bin as f64 * self.bin_width()
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.x_min + (bin as f64 + 0.5) * self.bin_width()
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    pub fn content(&self, bin: usize) -> f64 {
        self.contents[bin]
    }

    pub fn error(&self, bin: usize) -> f64 {
        self.variances[bin].sqrt()
    }

    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Bin index containing `x`, if inside `[x_min, x_max)`.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.x_min && x < self.x_max) {
            return None;
        }
        let i = ((x - self.x_min) / self.bin_width()) as usize;
        Some(i.min(self.bins() - 1))
    }

    /// First bin whose content is strictly above `threshold`.
    pub fn first_bin_above(&self, threshold: f64) -> Option<usize> {
        self.contents.iter().position(|&c| c > threshold)
    }

    /// `(center, content, error)` for every bin.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        (0..self.bins()).map(|i| (self.center(i), self.contents[i], self.error(i)))
    }

    fn ensure_compatible(&self, other: &Self, op: &str) -> Result<(), AnalysisError> {
        let scale = (self.x_max - self.x_min).abs().max(1.0);
        if self.bins() != other.bins()
            || (self.x_min - other.x_min).abs() > AXIS_TOL * scale
            || (self.x_max - other.x_max).abs() > AXIS_TOL * scale
        {
            return Err(AnalysisError::Binning(format!(
                "cannot {op} {} bins [{}, {}) and {} bins [{}, {})",
                self.bins(),
                self.x_min,
                self.x_max,
                other.bins(),
                other.x_min,
                other.x_max
            )));
        }
        Ok(())
    }

    /// `self + k·other`, variances `σ1² + k²σ2²`.
    pub fn added_scaled(&self, other: &Self, k: f64) -> Result<Self, AnalysisError> {
        self.ensure_compatible(other, "add")?;
        let contents = self
            .contents
            .iter()
            .zip(&other.contents)
            .map(|(a, b)| a + k * b)
            .collect();
        let variances = self
            .variances
            .iter()
            .zip(&other.variances)
            .map(|(a, b)| a + k * k * b)
            .collect();
        Ok(Self {
            x_min: self.x_min,
            x_max: self.x_max,
            contents,
            variances,
        })
    }

    pub fn added(&self, other: &Self) -> Result<Self, AnalysisError> {
        self.added_scaled(other, 1.0)
    }

    pub fn subtracted(&self, other: &Self) -> Result<Self, AnalysisError> {
        self.added_scaled(other, -1.0)
    }

    pub fn scaled(&self, k: f64) -> Self {
        Self {
            x_min: self.x_min,
            x_max: self.x_max,
            contents: self.contents.iter().map(|c| c * k).collect(),
            variances: self.variances.iter().map(|v| v * k * k).collect(),
        }
    }

    /// Merge every `group` adjacent bins.
    ///
    /// Trailing bins that do not fill a whole group are dropped and the axis
    /// is shortened accordingly.
    pub fn rebinned(&self, group: usize) -> Result<Self, AnalysisError> {
        if group == 0 {
            return Err(AnalysisError::Binning("rebin group must be positive".to_string()));
        }
        let new_bins = self.bins() / group;
        if new_bins == 0 {
            return Err(AnalysisError::Binning(format!(
                "cannot merge {group} bins of a {}-bin histogram",
                self.bins()
            )));
        }
        let merge = |values: &[f64]| -> Vec<f64> {
            values
                .chunks_exact(group)
                .map(|chunk| chunk.iter().sum())
                .collect()
        };
        Ok(Self {
            x_min: self.x_min,
            x_max: self.x_min + (new_bins * group) as f64 * self.bin_width(),
            contents: merge(&self.contents),
            variances: merge(&self.variances),
        })
    }

    /// Bin-by-bin quotient `self / other`.
    pub fn divided(&self, other: &Self) -> Result<Self, AnalysisError> {
        self.ensure_compatible(other, "divide")?;
        let mut out = self.clone();
        for i in 0..self.bins() {
            let (c1, v1) = (self.contents[i], self.variances[i]);
            let (c2, v2) = (other.contents[i], other.variances[i]);
            if c2 == 0.0 {
                out.contents[i] = 0.0;
                out.variances[i] = 0.0;
                continue;
            }
            let c2sq = c2 * c2;
            out.contents[i] = c1 / c2;
            out.variances[i] = (v1 * c2sq + v2 * c1 * c1) / (c2sq * c2sq);
        }
        Ok(out)
    }

    /// Bin-by-bin sum of all histograms.
    pub fn summed(hists: &[Self]) -> Result<Self, AnalysisError> {
        let (first, rest) = hists
            .split_first()
            .ok_or(AnalysisError::EmptyInput("histogram sum"))?;
        rest.iter().try_fold(first.clone(), |acc, h| acc.added(h))
    }

    /// Bin-by-bin inverse-variance weighted mean of all histograms.
    ///
    /// Inputs with zero variance in a bin carry no weight there; if no input
    /// has positive variance in a bin, the plain mean with zero variance is
    /// used.
    pub fn averaged(hists: &[Self]) -> Result<Self, AnalysisError> {
        let first = hists.first().ok_or(AnalysisError::EmptyInput("histogram average"))?;
        for h in &hists[1..] {
            first.ensure_compatible(h, "average")?;
        }
        let mut out = first.clone();
        for i in 0..first.bins() {
            let mut sum_w = 0.0;
            let mut sum_wc = 0.0;
            for h in hists {
                let v = h.variances[i];
                if v > 0.0 {
                    sum_w += 1.0 / v;
                    sum_wc += h.contents[i] / v;
                }
            }
            if sum_w > 0.0 {
                out.contents[i] = sum_wc / sum_w;
                out.variances[i] = 1.0 / sum_w;
            } else {
                out.contents[i] =
                    hists.iter().map(|h| h.contents[i]).sum::<f64>() / hists.len() as f64;
                out.variances[i] = 0.0;
            }
        }
        Ok(out)
    }

    /// Copy of the bins whose centers fall inside `[lo, hi]`.
    pub fn restricted(&self, lo: f64, hi: f64) -> Result<Self, AnalysisError> {
        let keep: Vec<usize> = (0..self.bins())
            .filter(|&i| {
                let c = self.center(i);
                c >= lo && c <= hi
            })
            .collect();
        let (Some(&first), Some(&last)) = (keep.first(), keep.last()) else {
            return Err(AnalysisError::Binning(format!(
                "no bins of [{}, {}) inside [{lo}, {hi}]",
                self.x_min, self.x_max
            )));
        };
        Ok(Self {
            x_min: self.low_edge(first),
            x_max: self.low_edge(last + 1),
            contents: self.contents[first..=last].to_vec(),
            variances: self.variances[first..=last].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(content: f64, variance: f64) -> Histogram {
        let mut h = Histogram::new(1, 0.0, 1.0).unwrap();
        h.contents[0] = content;
        h.variances[0] = variance;
        h
    }

    #[test]
    fn fill_counts_and_sets_poisson_variance() {
        let h = Histogram::from_samples(4, 0.0, 4.0, [0.5, 0.7, 3.2, 4.0, -1.0]).unwrap();
        assert_eq!(h.contents(), &[2.0, 0.0, 0.0, 1.0]);
        assert_eq!(h.variances(), &[2.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn division_adds_relative_variances() {
        let q = single(10.0, 10.0).divided(&single(5.0, 5.0)).unwrap();
        assert!((q.content(0) - 2.0).abs() < 1e-12);
        let rel_var = q.variances()[0] / (q.content(0) * q.content(0));
        let expected = (10f64.sqrt() / 10.0).powi(2) + (5f64.sqrt() / 5.0).powi(2);
        assert!((rel_var - expected).abs() < 1e-12);
    }

    #[test]
    fn division_by_empty_bin_is_zero() {
        let q = single(3.0, 3.0).divided(&single(0.0, 0.0)).unwrap();
        assert_eq!(q.content(0), 0.0);
        assert_eq!(q.error(0), 0.0);
    }

    #[test]
    fn subtraction_adds_variances_and_leaves_inputs_untouched() {
        let a = single(10.0, 10.0);
        let b = single(4.0, 1.0);
        let d = a.subtracted(&b).unwrap();
        assert_eq!(d.content(0), 6.0);
        assert_eq!(d.variances()[0], 11.0);
        assert_eq!(a.content(0), 10.0);
        assert_eq!(b.content(0), 4.0);
    }

    #[test]
    fn rebin_merges_content_and_variance() {
        let h = Histogram::from_samples(10, 0.0, 10.0, (0..10).map(|i| i as f64 + 0.5)).unwrap();
        let r = h.rebinned(4).unwrap();
        assert_eq!(r.bins(), 2);
        assert_eq!(r.contents(), &[4.0, 4.0]);
        assert_eq!(r.variances(), &[4.0, 4.0]);
        assert!((r.x_max() - 8.0).abs() < 1e-12);
        assert!((r.bin_width() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn incompatible_binning_is_rejected() {
        let a = Histogram::new(10, 0.0, 10.0).unwrap();
        let b = Histogram::new(5, 0.0, 10.0).unwrap();
        assert!(matches!(a.added(&b), Err(AnalysisError::Binning(_))));
        assert!(matches!(a.divided(&b), Err(AnalysisError::Binning(_))));
    }

    #[test]
    fn average_is_inverse_variance_weighted() {
        let avg = Histogram::averaged(&[single(1.0, 1.0), single(4.0, 4.0)]).unwrap();
        // weights 1 and 1/4 -> (1 + 1) / 1.25
        assert!((avg.content(0) - 1.6).abs() < 1e-12);
        assert!((avg.variances()[0] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn average_of_zero_variance_bins_is_plain_mean() {
        let avg = Histogram::averaged(&[single(1.0, 0.0), single(3.0, 0.0)]).unwrap();
        assert_eq!(avg.content(0), 2.0);
        assert_eq!(avg.error(0), 0.0);
    }

    #[test]
    fn sum_of_nothing_is_an_error() {
        assert!(matches!(Histogram::summed(&[]), Err(AnalysisError::EmptyInput(_))));
    }

    #[test]
    fn first_bin_above_and_restriction() {
        let h = Histogram::from_samples(
            10,
            0.0,
            10.0,
            [3.5, 3.5, 3.5, 6.5].into_iter(),
        )
        .unwrap();
        assert_eq!(h.first_bin_above(2.0), Some(3));
        assert_eq!(h.first_bin_above(5.0), None);

        let r = h.restricted(3.0, 7.0).unwrap();
        assert_eq!(r.bins(), 4);
        assert!((r.x_min() - 3.0).abs() < 1e-12);
        assert_eq!(r.contents(), &[3.0, 0.0, 0.0, 1.0]);
    }
}
