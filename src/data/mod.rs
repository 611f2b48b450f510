//! Synthetic data sources.

pub mod sample;

pub use sample::{CycleProfile, PERIOD_DURATIONS, nominal_cycle, simulate_cycle, simulate_run};
