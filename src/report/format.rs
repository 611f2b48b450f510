//! Formatted terminal output.
//!
//! All text formatting lives here so the reduction code stays free of
//! presentation details.

use crate::domain::{Experiment, Measurement};
use crate::fit::FitResult;
use crate::reduce::{BackgroundSummary, Normalization, ReadSummary, SweepResult};

/// Totals of the cycle reader.
pub fn format_read_summary(summary: &ReadSummary) -> String {
    format!(
        "Cycles: accepted={} rejected={} unassigned={} (entries={})\n",
        summary.accepted, summary.rejected, summary.unassigned, summary.entries
    )
}

/// Per-experiment block: ranges, background and transmissions.
pub fn format_experiment(ex: &Experiment) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", ex.id));
    out.push_str(&format!("Runs: {}\n", fmt_runs(ex)));

    let Some(r) = ex.analysis.as_ref() else {
        out.push_str(&format!("Cycles: {} (no analysis result)\n", ex.len()));
        return out;
    };

    out.push_str(&format!("Cycles: {}\n", r.cycles));
    out.push_str(&format!(
        "Beam current: [{:.3}, {:.3}] uA | temperature: [{:.3}, {:.3}] K\n",
        r.beam_current.min, r.beam_current.max, r.temperature.min, r.temperature.max
    ));
    if let Some(t) = &r.temperature_from_pressure {
        out.push_str(&format!("Temperature from vapor pressure: [{:.3}, {:.3}] K\n", t.min, t.max));
    }
    out.push_str(&format!("Li6 background: {} 1/s\n", fmt_m(r.background, 4)));
    out.push_str(&format!("Monitor average: {}\n", fmt_m(r.monitor_average, 1)));

    out.push_str(&format!("Transmission : {}{}\n", fmt_m(r.transmission(), 6), fmt_chi2(&r.transmission_fit)));
    match (r.transmission2(), &r.transmission2_fit) {
        (Some(t2), Some(fit)) => {
            out.push_str(&format!("Transmission2: {}{}\n", fmt_m(t2, 6), fmt_chi2(fit)));
        }
        _ => out.push_str("Transmission2: n/a\n"),
    }

    match &r.spectra {
        Some(s) => {
            for fit in [&s.saturation_fit, &s.li6_fit].into_iter().flatten() {
                out.push_str(&format_fit(fit));
            }
        }
        None => out.push_str("Combined spectra: n/a\n"),
    }
    out
}

/// One line per fit, parameters indented below.
pub fn format_fit(fit: &FitResult) -> String {
    let mut out = format!("{} fit{}\n", fit.model.display_name(), fmt_chi2(fit));
    for (i, name) in fit.names.iter().enumerate() {
        let Some(m) = fit.measurement(i) else { continue };
        let fixed = if fit.fixed.get(i).copied().unwrap_or(false) { " (fixed)" } else { "" };
        out.push_str(&format!("  {:<10} {}{fixed}\n", name, fmt_m(m, 5)));
    }
    out
}

/// Target/reference table of the configured comparisons.
pub fn format_comparisons(comparisons: &[Normalization]) -> String {
    let mut out = String::new();
    out.push_str("Comparisons:\n");
    out.push_str(
        format!(
            "{:<28} {:<28} {:>22} {:>22}\n",
            "target", "reference", "ratio", "ratio2"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<28} {:-<28} {:-<22} {:-<22}\n", "", "", "", "").trim_end());
    out.push('\n');
    for n in comparisons {
        let (ratio, ratio2) = if n.is_missing() {
            ("missing".to_string(), "missing".to_string())
        } else {
            (fmt_m(n.ratio.counting(), 4), fmt_m(n.ratio.irradiation(), 4))
        };
        out.push_str(
            format!(
                "{:<28} {:<28} {:>22} {:>22}\n",
                truncate(&n.target, 28),
                truncate(&n.reference, 28),
                ratio,
                ratio2
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One table per magnet-current sweep.
pub fn format_sweeps(sweeps: &[SweepResult]) -> String {
    let mut out = String::new();
    for sweep in sweeps {
        out.push_str(&format!("Sweep {} (normalized to {}_0A):\n", sweep.prefix, sweep.prefix));
        out.push_str(format!("{:>8} {:>20} {:>22} {:>22}\n", "label", "I_scm (A)", "ratio", "ratio2").trim_end());
        out.push('\n');
        for p in &sweep.points {
            out.push_str(
                format!(
                    "{:>8} {:>20} {:>22} {:>22}\n",
                    p.label,
                    fmt_m(p.current, 2),
                    fmt_m(p.normalization.ratio.counting(), 4),
                    fmt_m(p.normalization.ratio.irradiation(), 4)
                )
                .trim_end(),
            );
            out.push('\n');
        }
    }
    out
}

pub fn format_background(summary: &BackgroundSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Li6 background: {} experiments\n", summary.rates.len()));
    if let Some(m) = summary.low_background_fit.as_ref().and_then(|f| f.measurement(0)) {
        out.push_str(&format!("  low-background average: {} 1/s\n", fmt_m(m, 4)));
    }
    if let Some(m) = summary.irradiation_fit.as_ref().and_then(|f| f.measurement(0)) {
        out.push_str(&format!(
            "  irradiation rate: {} 1/s/uA over {} cycles\n",
            fmt_m(m, 4),
            summary.irradiation_rates.len()
        ));
    }
    out
}

fn fmt_runs(ex: &Experiment) -> String {
    let runs: Vec<String> = ex.runs.iter().map(|r| r.to_string()).collect();
    runs.join(", ")
}

fn fmt_m(m: Measurement, digits: usize) -> String {
    format!("{:.*} +/- {:.*}", digits, m.value, digits, m.error)
}

fn fmt_chi2(fit: &FitResult) -> String {
    match fit.reduced_chi2() {
        Some(r) => format!("  chi2/ndf={:.1}/{} ({r:.2})", fit.chi2, fit.ndf),
        None => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExperimentSpec;
    use crate::reduce::{SweepPoint, TransmissionRatio};

    fn normalization(target: &str, missing: bool) -> Normalization {
        Normalization {
            target: target.into(),
            reference: "18-045".into(),
            ratio: if missing {
                TransmissionRatio::missing()
            } else {
                TransmissionRatio {
                    ratio: 0.5,
                    error: 0.01,
                    ratio2: 0.52,
                    error2: 0.02,
                }
            },
            spectrum: None,
            spectrum2: None,
        }
    }

    #[test]
    fn comparison_table_marks_missing_rows() {
        let text = format_comparisons(&[normalization("18-480", false), normalization("18-999", true)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[3].contains("0.5000 +/- 0.0100"));
        assert!(lines[3].contains("0.5200 +/- 0.0200"));
        assert!(lines[4].ends_with("missing"));
        assert!(lines.iter().all(|l| !l.ends_with(' ')));
    }

    #[test]
    fn sweep_table_lists_points_in_order() {
        let sweep = SweepResult {
            prefix: "18-065".into(),
            points: ["0", "100"]
                .iter()
                .map(|&label| SweepPoint {
                    label: label.into(),
                    current: Measurement::new(label.parse().unwrap(), 0.1),
                    normalization: normalization(label, false),
                })
                .collect(),
        };
        let text = format_sweeps(&[sweep]);
        assert!(text.starts_with("Sweep 18-065 (normalized to 18-065_0A):"));
        let rows: Vec<&str> = text.lines().skip(2).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].contains("100.00 +/- 0.10"));
    }

    #[test]
    fn experiment_without_result_is_reported() {
        let spec = ExperimentSpec { id: "18-045".into(), runs: vec![965, 964] };
        let ex = Experiment::new(&spec, 10).unwrap();
        let text = format_experiment(&ex);
        assert!(text.contains("=== 18-045 ==="));
        assert!(text.contains("Runs: 964, 965"));
        assert!(text.contains("no analysis result"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
