//! Figure builders: turn analysis results into `Figure` pages.

use crate::domain::{Measurement, TimeWindow};
use crate::fit::FitResult;
use crate::models::curve_grid;
use crate::reduce::{BackgroundSummary, Normalization, RunPoint, Spectra, SweepResult, TransmissionResult};
use crate::report::chart::{Figure, Series};

const CURVE_POINTS: usize = 400;

fn fit_curve(fit: &FitResult, fallback: TimeWindow) -> Series {
    let range = fit.range.unwrap_or(fallback);
    Series::Curve {
        label: fit.model.display_name().to_string(),
        points: curve_grid(fit.model, &fit.values, range, CURVE_POINTS),
    }
}

fn constant_line(fit: &FitResult, x0: f64, x1: f64) -> Option<Series> {
    let m = fit.measurement(0)?;
    Some(Series::Curve {
        label: format!("{:.4} +/- {:.4}", m.value, m.error),
        points: vec![(x0, m.value), (x1, m.value)],
    })
}

fn per_cycle(label: &str, cycles: &[f64], values: &[Measurement]) -> Series {
    Series::Points {
        label: label.to_string(),
        points: cycles.iter().copied().zip(values.iter().copied()).collect(),
    }
}

fn cycle_span(cycles: &[f64]) -> (f64, f64) {
    let lo = cycles.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = cycles.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() { (lo, hi) } else { (0.0, 1.0) }
}

/// All pages of one experiment, in a fixed order.
pub fn experiment_figures(id: &str, r: &TransmissionResult) -> Vec<Figure> {
    let mut figures = Vec::new();
    let (c0, c1) = cycle_span(&r.cycle_numbers);

    let mut f = Figure::new(&format!("{id}_transmission"), &format!("{id}: Li6 / monitor"), "Cycle", "Ratio")
        .with(per_cycle("counting window", &r.cycle_numbers, &r.counting_ratio));
    if let Some(line) = constant_line(&r.transmission_fit, c0, c1) {
        f = f.with(line);
    }
    figures.push(f);

    if let (Some(ratio), Some(fit)) = (&r.irradiation_ratio, &r.transmission2_fit) {
        let mut f = Figure::new(
            &format!("{id}_transmission2"),
            &format!("{id}: Li6 / monitor, secondary windows"),
            "Cycle",
            "Ratio",
        )
        .with(per_cycle("secondary windows", &r.cycle_numbers, ratio));
        if let Some(line) = constant_line(fit, c0, c1) {
            f = f.with(line);
        }
        figures.push(f);
    }

    figures.push(
        Figure::new(&format!("{id}_irradiation"), &format!("{id}: Li6 rate during irradiation"), "Cycle", "Rate (1/s/uA)")
            .with(per_cycle("irradiation", &r.cycle_numbers, &r.irradiation_rate)),
    );

    if !r.vapor_pressure.is_empty() {
        figures.push(
            Figure::new(&format!("{id}_vapor"), &format!("{id}: source vapor pressure"), "Cycle", "Pressure (torr)").with(
                Series::Points {
                    label: "vapor pressure".into(),
                    points: r.vapor_pressure.iter().map(|p| (p.cycle, p.pressure)).collect(),
                },
            ),
        );
    }

    if let Some(s) = &r.spectra {
        spectra_figures(id, s, &mut figures);
    }

    figures.push(
        Figure::new(&format!("{id}_channels"), &format!("{id}: Li6 channels"), "Channel", "Hits")
            .with(Series::Binned { label: "channels".into(), hist: r.channels.clone() }),
    );
    figures.push(
        Figure::new(&format!("{id}_window_origins"), &format!("{id}: Li6 window origin"), "Time (s)", "Cycles")
            .with(Series::Binned { label: "origin".into(), hist: r.window_origins.clone() }),
    );
    figures
}

/// Combined time spectra, fitted rates and rate ratios.
fn spectra_figures(id: &str, s: &Spectra, figures: &mut Vec<Figure>) {
    let full = TimeWindow::new(s.he3_total.x_min(), s.he3_total.x_max());
    let mut f = Figure::new(&format!("{id}_he3"), &format!("{id}: He3 rate"), "Time (s)", "Counts")
        .with(Series::Binned { label: "He3".into(), hist: s.he3_total.clone() });
    if let Some(fit) = &s.saturation_fit {
        f = f.with(fit_curve(fit, full));
    }
    figures.push(f);

    let mut f = Figure::new(&format!("{id}_li6"), &format!("{id}: Li6 rate"), "Time (s)", "Counts")
        .with(Series::Binned { label: "Li6".into(), hist: s.li6_total.clone() });
    if let Some(fit) = &s.li6_fit {
        f = f.with(fit_curve(fit, full));
    }
    figures.push(f);

    let mut f = Figure::new(
        &format!("{id}_normalized"),
        &format!("{id}: normalized Li6 spectrum"),
        "Time (s)",
        "Li6 / monitor",
    )
    .with(Series::Binned { label: "counting".into(), hist: s.normalized_counting.clone() });
    if let Some(h) = &s.normalized_irradiation {
        f = f.with(Series::Binned { label: "secondary".into(), hist: h.clone() });
    }
    figures.push(f);

    figures.push(
        Figure::new(&format!("{id}_rate_ratio"), &format!("{id}: Li6 / He3 rate"), "Time (s)", "Ratio")
            .with(Series::Binned { label: "cumulative".into(), hist: s.cumulative_ratio.clone() })
            .with(Series::Binned { label: "averaged".into(), hist: s.average_ratio.clone() }),
    );
}

/// Target/reference spectrum ratios. Missing comparisons produce no page.
pub fn comparison_figure(n: &Normalization) -> Option<Figure> {
    let spectrum = n.spectrum.as_ref()?;
    let mut f = Figure::new(
        &format!("{}_vs_{}", n.target, n.reference),
        &format!("{} / {}", n.target, n.reference),
        "Time (s)",
        "Ratio",
    )
    .with(Series::Binned { label: "counting".into(), hist: spectrum.clone() });
    if let Some(h) = &n.spectrum2 {
        f = f.with(Series::Binned { label: "secondary".into(), hist: h.clone() });
    }
    Some(f)
}

/// Transmission ratios against the mean magnet current.
pub fn sweep_figure(sweep: &SweepResult) -> Figure {
    let counting = sweep
        .points
        .iter()
        .map(|p| (p.current.value, p.normalization.ratio.counting()))
        .collect();
    let secondary = sweep
        .points
        .iter()
        .map(|p| (p.current.value, p.normalization.ratio.irradiation()))
        .collect();
    Figure::new(
        &format!("{}_sweep", sweep.prefix),
        &format!("{}: transmission vs SCM current", sweep.prefix),
        "SCM current (A)",
        "Ratio to 0 A",
    )
    .with(Series::Points { label: "counting".into(), points: counting })
    .with(Series::Points { label: "secondary".into(), points: secondary })
}

fn run_series(label: &str, points: &[RunPoint]) -> Series {
    Series::Points {
        label: label.to_string(),
        points: points.iter().map(|p| (p.run as f64, p.value)).collect(),
    }
}

fn run_span(points: &[RunPoint]) -> (f64, f64) {
    let runs: Vec<f64> = points.iter().map(|p| p.run as f64).collect();
    cycle_span(&runs)
}

pub fn background_figures(summary: &BackgroundSummary) -> Vec<Figure> {
    let mut figures = Vec::new();
    if !summary.rates.is_empty() {
        let (r0, r1) = run_span(&summary.rates);
        let mut f = Figure::new("li6_background", "Li6 background", "Run", "Rate (1/s)")
            .with(run_series("background", &summary.rates));
        if let Some(line) = summary.low_background_fit.as_ref().and_then(|fit| constant_line(fit, r0, r1)) {
            f = f.with(line);
        }
        figures.push(f);
    }
    if !summary.irradiation_rates.is_empty() {
        let (r0, r1) = run_span(&summary.irradiation_rates);
        let mut f = Figure::new("li6_irradiation", "Li6 rate during irradiation", "Run", "Rate (1/s/uA)")
            .with(run_series("irradiation", &summary.irradiation_rates));
        if let Some(line) = summary.irradiation_fit.as_ref().and_then(|fit| constant_line(fit, r0, r1)) {
            f = f.with(line);
        }
        figures.push(f);
    }
    figures
}

pub fn monitor_figure(monitor: &[(u32, f64)]) -> Option<Figure> {
    if monitor.is_empty() {
        return None;
    }
    let points = monitor
        .iter()
        .map(|&(run, counts)| (run as f64, Measurement::new(counts, counts.max(0.0).sqrt())))
        .collect();
    Some(
        Figure::new("monitor", "Monitor counts, secondary window", "Run", "Counts")
            .with(Series::Points { label: "He3".into(), points }),
    )
}
