//! Reporting: text summaries and figures.
//!
//! - `format`: terminal output
//! - `chart`: the `Figure` description and the sinks that consume it
//! - `figures`: builders from analysis results to figures

pub mod chart;
pub mod figures;
pub mod format;

pub use chart::{CollectingSink, Figure, FigureSink, ReportStyle, Series, SvgSink};
pub use figures::*;
pub use format::*;
