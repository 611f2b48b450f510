//! JSON-lines cycle input.
//!
//! Each non-blank line is one `Cycle` object. The reader is lazy: cycles are
//! parsed as the pipeline pulls them, so a whole run never sits in memory as
//! raw records. A malformed line ends the stream with an exit-code-2 error.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::domain::Cycle;
use crate::error::AppError;

/// Streaming reader of JSON-lines cycle records.
pub struct CycleReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl CycleReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open cycle file '{}': {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CycleReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for CycleReader<R> {
    type Item = Result<Cycle, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(AppError::new(2, format!("Failed to read cycle file: {e}")))),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&text)
                    .map_err(|e| AppError::new(2, format!("Invalid cycle record on line {}: {e}", self.line))),
            );
        }
    }
}

/// Write cycles as JSON lines.
pub fn write_cycles(path: &Path, cycles: &[Cycle]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create cycle file '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    for cycle in cycles {
        serde_json::to_writer(&mut out, cycle)
            .map_err(|e| AppError::new(2, format!("Failed to encode cycle {}/{}: {e}", cycle.run, cycle.cycle)))?;
        writeln!(out).map_err(|e| AppError::new(2, format!("Failed to write cycle file: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write cycle file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::nominal_cycle;
    use std::io::Cursor;

    #[test]
    fn cycles_survive_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycles.jsonl");
        let cycles = vec![nominal_cycle(964, 1), nominal_cycle(964, 2)];
        write_cycles(&path, &cycles).unwrap();

        let read: Vec<Cycle> = CycleReader::open(&path).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].cycle, 2);
        assert_eq!(read[0].li6_counts, cycles[0].li6_counts);
        assert_eq!(read[0].start, cycles[0].start);
    }

    #[test]
    fn blank_lines_are_skipped_and_bad_lines_reported() {
        let good = serde_json::to_string(&nominal_cycle(1, 1)).unwrap();
        let text = format!("{good}\n\n{{\"run\": 1}}\n");
        let mut reader = CycleReader::new(Cursor::new(text));
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 3"), "{err}");
        assert!(reader.next().is_none());
    }

    #[test]
    fn optional_fields_default() {
        let mut value = serde_json::to_value(nominal_cycle(1, 1)).unwrap();
        let obj = value.as_object_mut().unwrap();
        for key in ["valve0_state", "valve1_state", "scm_voltages", "li6_channels"] {
            obj.remove(key);
        }
        let cycle: Cycle = serde_json::from_value(value).unwrap();
        assert!(cycle.scm_voltages.is_empty());
        assert!(!cycle.valves_nominal());
    }

    #[test]
    fn missing_file_is_exit_code_2() {
        let err = CycleReader::open(Path::new("/nonexistent/cycles.jsonl")).err().unwrap();
        assert_eq!(err.exit_code(), 2);
    }
}
