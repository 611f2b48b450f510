//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - value types (`Measurement`, `WindowCounts`, `TimeWindow`, `Detector`)
//! - the static `AnalysisConfig`
//! - the raw `Cycle` record and the per-experiment `Experiment` accumulator

pub mod config;
pub mod cycle;
pub mod experiment;
pub mod types;

pub use config::*;
pub use cycle::*;
pub use experiment::*;
pub use types::*;
