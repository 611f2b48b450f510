//! Figures and figure sinks.
//!
//! The analysis describes each figure as plain data (`Figure`): a title,
//! axis labels and a list of series. A `FigureSink` decides what to do with
//! it. `SvgSink` renders one SVG page per figure with Plotters,
//! `CollectingSink` keeps the figures in memory.
//!
//! Rendering never feeds back into the analysis: the sink only reads.

use std::path::PathBuf;

use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Measurement;
use crate::error::AppError;
use crate::hist::Histogram;

/// Process-wide presentation settings. Only sinks read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStyle {
    pub width: u32,
    pub height: u32,
    pub output_dir: PathBuf,
    pub font_size: u32,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 640,
            output_dir: PathBuf::from("figures"),
            font_size: 16,
        }
    }
}

/// One data series of a figure.
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    /// Bin contents with error bars at the bin centers.
    Binned { label: String, hist: Histogram },
    /// Points with vertical error bars.
    Points { label: String, points: Vec<(f64, Measurement)> },
    /// A smooth curve (e.g. a fitted model).
    Curve { label: String, points: Vec<(f64, f64)> },
}

impl Series {
    pub fn label(&self) -> &str {
        match self {
            Series::Binned { label, .. } | Series::Points { label, .. } | Series::Curve { label, .. } => label,
        }
    }

    /// `(x, y, error)` triples of the series.
    fn samples(&self) -> Vec<(f64, f64, f64)> {
        match self {
            Series::Binned { hist, .. } => hist.points().collect(),
            Series::Points { points, .. } => points.iter().map(|(x, m)| (*x, m.value, m.error)).collect(),
            Series::Curve { points, .. } => points.iter().map(|&(x, y)| (x, y, 0.0)).collect(),
        }
    }
}

/// Everything needed to draw one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    /// File-name friendly identifier.
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
}

impl Figure {
    pub fn new(name: &str, title: &str, x_label: &str, y_label: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            series: Vec::new(),
            x_range: None,
            y_range: None,
        }
    }

    pub fn with(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_x_range(mut self, lo: f64, hi: f64) -> Self {
        self.x_range = Some((lo, hi));
        self
    }

    pub fn with_y_range(mut self, lo: f64, hi: f64) -> Self {
        self.y_range = Some((lo, hi));
        self
    }

    /// Axis bounds: explicit ranges if given, otherwise the data extent
    /// (including error bars) with a small margin.
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let samples: Vec<(f64, f64, f64)> = self
            .series
            .iter()
            .flat_map(|s| s.samples())
            .filter(|(x, y, e)| x.is_finite() && y.is_finite() && e.is_finite())
            .collect();
        let x = self.x_range.or_else(|| {
            let lo = samples.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
            let hi = samples.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
            padded(lo, hi)
        })?;
        let y = self.y_range.or_else(|| {
            let in_x = samples.iter().filter(|s| s.0 >= x.0 && s.0 <= x.1);
            let lo = in_x.clone().map(|s| s.1 - s.2).fold(f64::INFINITY, f64::min);
            let hi = in_x.map(|s| s.1 + s.2).fold(f64::NEG_INFINITY, f64::max);
            padded(lo, hi)
        })?;
        Some((x, y))
    }
}

fn padded(lo: f64, hi: f64) -> Option<(f64, f64)> {
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    if hi - lo < 1e-12 {
        let pad = lo.abs().max(1.0) * 0.1;
        return Some((lo - pad, hi + pad));
    }
    let pad = (hi - lo) * 0.05;
    Some((lo - pad, hi + pad))
}

/// Consumer of finished figures, one call per page.
pub trait FigureSink {
    fn render(&mut self, figure: &Figure) -> Result<(), AppError>;
}

/// Keeps every figure in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub figures: Vec<Figure>,
}

impl CollectingSink {
    pub fn names(&self) -> Vec<&str> {
        self.figures.iter().map(|f| f.name.as_str()).collect()
    }
}

impl FigureSink for CollectingSink {
    fn render(&mut self, figure: &Figure) -> Result<(), AppError> {
        self.figures.push(figure.clone());
        Ok(())
    }
}

/// Writes `NNN_<name>.svg` pages into the style's output directory.
pub struct SvgSink {
    style: ReportStyle,
    pages: usize,
}

impl SvgSink {
    pub fn new(style: ReportStyle) -> Result<Self, AppError> {
        std::fs::create_dir_all(&style.output_dir).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create figure directory '{}': {e}", style.output_dir.display()),
            )
        })?;
        Ok(Self { style, pages: 0 })
    }

    pub fn pages(&self) -> usize {
        self.pages
    }
}

const PALETTE: [RGBColor; 4] = [
    RGBColor(0, 0, 0),
    RGBColor(200, 30, 30),
    RGBColor(30, 90, 200),
    RGBColor(20, 150, 60),
];

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl FigureSink for SvgSink {
    fn render(&mut self, figure: &Figure) -> Result<(), AppError> {
        let Some(((x0, x1), (y0, y1))) = figure.bounds() else {
            tracing::debug!(figure = %figure.name, "nothing to draw");
            return Ok(());
        };
        self.pages += 1;
        let path = self
            .style
            .output_dir
            .join(format!("{:03}_{}.svg", self.pages, file_stem(&figure.name)));
        let area = self.style.font_size;
        let font = self.style.font_size as i32;

        let draw = || -> Result<(), Box<dyn std::error::Error>> {
            let root = SVGBackend::new(&path, (self.style.width, self.style.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(&figure.title, ("sans-serif", font + 4).into_font())
                .margin(12)
                .x_label_area_size(area * 3)
                .y_label_area_size(area * 5)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .x_desc(&figure.x_label)
                .y_desc(&figure.y_label)
                .label_style(("sans-serif", font).into_font())
                .axis_desc_style(("sans-serif", font + 2).into_font())
                .draw()?;

            for (i, series) in figure.series.iter().enumerate() {
                let color = PALETTE[i % PALETTE.len()];
                let samples: Vec<(f64, f64, f64)> = series
                    .samples()
                    .into_iter()
                    .filter(|&(x, y, e)| x >= x0 && x <= x1 && y.is_finite() && e.is_finite())
                    .collect();
                match series {
                    Series::Curve { .. } => {
                        chart
                            .draw_series(LineSeries::new(samples.iter().map(|&(x, y, _)| (x, y)), &color))?
                            .label(series.label())
                            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
                    }
                    Series::Binned { .. } | Series::Points { .. } => {
                        chart.draw_series(samples.iter().filter(|s| s.2 > 0.0).map(|&(x, y, e)| {
                            PathElement::new(vec![(x, y - e), (x, y + e)], color)
                        }))?;
                        chart
                            .draw_series(samples.iter().map(|&(x, y, _)| Circle::new((x, y), 2, color.filled())))?
                            .label(series.label())
                            .legend(move |(x, y)| Circle::new((x + 8, y), 3, color.filled()));
                    }
                }
            }

            if figure.series.len() > 1 {
                chart
                    .configure_series_labels()
                    .border_style(BLACK)
                    .background_style(WHITE.mix(0.8))
                    .label_font(("sans-serif", font).into_font())
                    .draw()?;
            }
            root.present()?;
            Ok(())
        };

        draw().map_err(|e| AppError::new(2, format!("Failed to render '{}': {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_figure() -> Figure {
        let hist = Histogram::from_samples(10, 0.0, 10.0, [1.5, 2.5, 2.5, 7.0]).unwrap();
        Figure::new("18-045 Li6", "Li6 rate", "Time (s)", "Counts")
            .with(Series::Binned { label: "data".into(), hist })
            .with(Series::Curve {
                label: "fit".into(),
                points: vec![(0.0, 1.0), (10.0, 0.5)],
            })
    }

    #[test]
    fn bounds_cover_data_and_errors() {
        let ((x0, x1), (y0, y1)) = sample_figure().bounds().unwrap();
        assert!(x0 < 0.5 && x1 >= 10.0);
        // highest point 2 ± √2
        assert!(y1 >= 2.0 + 2f64.sqrt());
        assert!(y0 < 0.0);
    }

    #[test]
    fn explicit_ranges_win() {
        let f = sample_figure().with_x_range(60.0, 120.0).with_y_range(0.0, 1.5);
        assert_eq!(f.bounds(), Some(((60.0, 120.0), (0.0, 1.5))));
    }

    #[test]
    fn empty_figure_has_no_bounds() {
        assert!(Figure::new("e", "e", "x", "y").bounds().is_none());
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let mut sink = CollectingSink::default();
        sink.render(&sample_figure()).unwrap();
        sink.render(&Figure::new("second", "", "", "")).unwrap();
        assert_eq!(sink.names(), vec!["18-045 Li6", "second"]);
    }

    #[test]
    fn svg_sink_writes_numbered_pages() {
        let dir = tempfile::tempdir().unwrap();
        let style = ReportStyle {
            output_dir: dir.path().join("figs"),
            ..ReportStyle::default()
        };
        let mut sink = SvgSink::new(style).unwrap();
        sink.render(&sample_figure()).unwrap();
        // nothing to draw: no page
        sink.render(&Figure::new("empty", "", "", "")).unwrap();
        assert_eq!(sink.pages(), 1);
        let page = dir.path().join("figs").join("001_18-045_Li6.svg");
        let svg = std::fs::read_to_string(page).unwrap();
        assert!(svg.contains("<svg"));
    }
}
