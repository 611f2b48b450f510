//! Cross-experiment normalization.
//!
//! A target experiment is compared with a reference by dividing their
//! transmission figures and their normalized Li6 spectra. Both are looked up
//! by id prefix; a miss is not an error, the comparison just comes back as
//! all zeros so one bad pairing cannot stop a batch.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{AnalysisConfig, Experiment, Measurement};
use crate::hist::Histogram;
use crate::reduce::transmission::TransmissionResult;

/// The four comparison scalars.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TransmissionRatio {
    pub ratio: f64,
    pub error: f64,
    pub ratio2: f64,
    pub error2: f64,
}

impl TransmissionRatio {
    /// Sentinel returned when an experiment cannot be found.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.ratio, self.error, self.ratio2, self.error2)
    }

    pub fn counting(&self) -> Measurement {
        Measurement::new(self.ratio, self.error)
    }

    pub fn irradiation(&self) -> Measurement {
        Measurement::new(self.ratio2, self.error2)
    }
}

/// Target normalized to reference.
#[derive(Debug, Clone, Serialize)]
pub struct Normalization {
    pub target: String,
    pub reference: String,
    pub ratio: TransmissionRatio,
    /// Ratio of the counting-normalized spectra inside the display window.
    pub spectrum: Option<Histogram>,
    /// Ratio of the irradiation-normalized spectra inside the display window.
    pub spectrum2: Option<Histogram>,
}

impl Normalization {
    fn missing(target: &str, reference: &str) -> Self {
        Self {
            target: target.to_string(),
            reference: reference.to_string(),
            ratio: TransmissionRatio::missing(),
            spectrum: None,
            spectrum2: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.ratio == TransmissionRatio::missing()
    }
}

/// First experiment whose id starts with `prefix`, analyzed or not.
pub fn find_experiment<'a>(experiments: &'a [Experiment], prefix: &str) -> Option<&'a Experiment> {
    experiments.iter().find(|ex| ex.id.starts_with(prefix))
}

fn spectrum_ratio(
    target: Option<&Histogram>,
    reference: Option<&Histogram>,
    config: &AnalysisConfig,
) -> Option<Histogram> {
    let (t, r) = (target?, reference?);
    let w = config.display_window;
    match t.divided(r).and_then(|h| h.restricted(w.start, w.end)) {
        Ok(h) => Some(h),
        Err(err) => {
            warn!(error = %err, "cannot divide normalized spectra");
            None
        }
    }
}

/// Compare experiment `target` with experiment `reference` (id prefixes).
pub fn normalize(experiments: &[Experiment], target: &str, reference: &str, config: &AnalysisConfig) -> Normalization {
    let lookup = |prefix: &str| -> Option<(&Experiment, &TransmissionResult)> {
        let ex = find_experiment(experiments, prefix)?;
        Some((ex, ex.analysis.as_ref()?))
    };
    let (Some((tex, t)), Some((rex, r))) = (lookup(target), lookup(reference)) else {
        warn!(target, reference, "experiment not found or not analyzed, skipping comparison");
        return Normalization::missing(target, reference);
    };

    let counting = t.transmission().divided(r.transmission());
    let irradiation = match (t.transmission2(), r.transmission2()) {
        (Some(a), Some(b)) => a.divided(b),
        _ => {
            warn!(
                target = %tex.id,
                reference = %rex.id,
                "no irradiation-normalized transmission on both sides"
            );
            Measurement::ZERO
        }
    };
    let ratio = TransmissionRatio {
        ratio: counting.value,
        error: counting.error,
        ratio2: irradiation.value,
        error2: irradiation.error,
    };
    info!(
        target = %tex.id,
        reference = %rex.id,
        ratio = ratio.ratio,
        error = ratio.error,
        ratio2 = ratio.ratio2,
        error2 = ratio.error2,
        "transmission ratio"
    );

    Normalization {
        target: tex.id.clone(),
        reference: rex.id.clone(),
        ratio,
        spectrum: spectrum_ratio(t.normalized_counting(), r.normalized_counting(), config),
        spectrum2: spectrum_ratio(t.normalized_irradiation(), r.normalized_irradiation(), config),
    }
}
