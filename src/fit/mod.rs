//! Curve fitting.
//!
//! Responsibilities:
//!
//! - bounded Levenberg-Marquardt fits of the `models` to binned series
//! - multi-start seeding (parallel over seeds)
//! - analytic constant fits to point series
//! - chi-square based error inflation of every fit result

pub mod constant;
pub mod fitter;
pub mod quality;
pub mod seeds;

pub use constant::*;
pub use fitter::*;
pub use quality::*;
pub use seeds::*;
