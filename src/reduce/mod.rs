//! Data reduction pipeline stages.
//!
//! - `filter` / `extract`: raw cycles → per-experiment entries
//! - `background`: Poisson rates and background-subtracted ratios
//! - `transmission`: per-experiment analysis
//! - `normalize`: target/reference comparisons
//! - `summary`: background, monitor and current-sweep summaries

pub mod background;
pub mod extract;
pub mod filter;
pub mod normalize;
pub mod summary;
pub mod transmission;

pub use background::*;
pub use extract::*;
pub use filter::*;
pub use normalize::*;
pub use summary::*;
pub use transmission::*;
