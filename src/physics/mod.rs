//! Physical property conversions.

pub mod vapor;

pub use vapor::{T_MAX, T_MIN, temperature, vapor_pressure};
