//! Analysis configuration files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::domain::AnalysisConfig;
use crate::error::AppError;

/// Read an `AnalysisConfig` from JSON. Missing sections keep their defaults.
pub fn load_config(path: &Path) -> Result<AnalysisConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
    let config: AnalysisConfig = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid config '{}': {e}", path.display())))?;
    validate(&config)?;
    Ok(config)
}

/// Write `config` as pretty JSON (e.g. to start from the defaults).
pub fn write_config(path: &Path, config: &AnalysisConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create config '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| AppError::new(2, format!("Failed to write config: {e}")))?;
    Ok(())
}

fn validate(config: &AnalysisConfig) -> Result<(), AppError> {
    let b = &config.binning;
    if b.li6_bins_per_second == 0 || b.he3_bins_per_second == 0 || b.normalized_rebin == 0 || b.ratio_bin_seconds == 0 {
        return Err(AppError::new(2, "Binning factors must be positive."));
    }
    if b.li6_bins_per_second % b.he3_bins_per_second != 0 {
        return Err(AppError::new(
            2,
            "Li6 bins per second must be a multiple of He3 bins per second.",
        ));
    }
    if config.windows.li6_width <= 0.0 || config.windows.he3_window.width() <= 0.0 {
        return Err(AppError::new(2, "Secondary windows must have positive width."));
    }
    for ex in &config.experiments {
        if ex.id.is_empty() {
            return Err(AppError::new(2, "Experiment ids must not be empty."));
        }
        if ex.runs.is_empty() {
            return Err(AppError::new(2, format!("Experiment '{}' lists no runs.", ex.id)));
        }
    }
    Ok(())
}
