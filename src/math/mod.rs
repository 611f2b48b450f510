//! Mathematical utilities: linear solves, special functions, root finding and
//! descriptive statistics.

pub mod ols;
pub mod roots;
pub mod special;
pub mod stats;

pub use ols::*;
pub use roots::*;
pub use special::*;
pub use stats::*;
