//! Binned series with propagated variance.

pub mod histogram;

pub use histogram::*;
