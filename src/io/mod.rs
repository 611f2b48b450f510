//! Input/output helpers.
//!
//! - JSON-lines cycle reader and writer (`ingest`)
//! - analysis config files (`config`)
//! - result exports (JSON/CSV) (`export`)

pub mod config;
pub mod export;
pub mod ingest;

pub use config::*;
pub use export::*;
pub use ingest::*;
