//! `ucn-transmission` library crate.
//!
//! Data reduction for ultracold-neutron guide transmission measurements:
//! cycles recorded by a Li6 detector behind the guide under test and a He3
//! monitor near the source are screened, integrated over counting windows,
//! background-subtracted, normalized to the monitor and fitted.
//!
//! The binary (`ucn`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the reduction can be driven from other front-ends or notebooks

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod hist;
pub mod io;
pub mod math;
pub mod models;
pub mod physics;
pub mod reduce;
pub mod report;
pub mod telemetry;
