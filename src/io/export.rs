//! Export analysis results.
//!
//! - the full result document as JSON (every experiment, comparison, sweep)
//! - the comparison and sweep scalars as CSV, easy to consume in
//!   spreadsheets or downstream scripts

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::reduce::{Normalization, SweepResult};

/// Write any serializable result document as pretty JSON.
pub fn write_results_json<T: Serialize>(path: &Path, results: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, results)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Write comparison and sweep ratios to a CSV file.
pub fn write_ratios_csv(path: &Path, comparisons: &[Normalization], sweeps: &[SweepResult]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let row_err = |e: std::io::Error| AppError::new(2, format!("Failed to write export CSV row: {e}"));

    writeln!(
        out,
        "kind,target,reference,scm_current,scm_current_err,ratio,ratio_err,ratio2,ratio2_err"
    )
    .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let mut row = |kind: &str, n: &Normalization, current: Option<(f64, f64)>| {
        let (cur, cur_err) = current
            .map(|(v, e)| (format!("{v:.4}"), format!("{e:.4}")))
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{},{},{:.8},{:.8},{:.8},{:.8}",
            kind,
            csv_field(&n.target),
            csv_field(&n.reference),
            cur,
            cur_err,
            n.ratio.ratio,
            n.ratio.error,
            n.ratio.ratio2,
            n.ratio.error2,
        )
        .map_err(row_err)
    };

    for n in comparisons {
        row("comparison", n, None)?;
    }
    for sweep in sweeps {
        for p in &sweep.points {
            row("sweep", &p.normalization, Some((p.current.value, p.current.error)))?;
        }
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))?;
    Ok(())
}

/// Quote a field if it contains a separator or quote.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Measurement;
    use crate::reduce::{SweepPoint, TransmissionRatio};

    fn normalization(target: &str, ratio: f64) -> Normalization {
        Normalization {
            target: target.to_string(),
            reference: "18-045 (IV2+UGD22+IV3, O-rings in)".to_string(),
            ratio: TransmissionRatio {
                ratio,
                error: 0.01,
                ratio2: ratio,
                error2: 0.02,
            },
            spectrum: None,
            spectrum2: None,
        }
    }

    #[test]
    fn csv_has_one_row_per_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratios.csv");
        let sweep = SweepResult {
            prefix: "18-065".into(),
            points: vec![SweepPoint {
                label: "100".into(),
                current: Measurement::new(100.2, 0.05),
                normalization: normalization("18-065_100A", 0.9),
            }],
        };
        write_ratios_csv(&path, &[normalization("18-480", 0.5)], &[sweep]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("kind,target"));
        assert!(lines[1].starts_with("comparison,18-480,\"18-045 (IV2+UGD22+IV3, O-rings in)\",,,0.50000000"));
        assert!(lines[2].starts_with("sweep,18-065_100A,"));
        assert!(lines[2].contains(",100.2000,0.0500,0.90000000"));
    }

    #[test]
    fn json_document_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_results_json(&path, &vec![normalization("a", 1.0)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["target"], "a");
        assert_eq!(value[0]["ratio"]["ratio"], 1.0);
    }
}
