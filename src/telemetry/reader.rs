//! # Telemetry Log Reader
//!
//! Reference consumer of the persisted log: skips header rows and parses
//! each data row into a [`TelemetrySample`].

use std::path::Path;

use thiserror::Error;

use crate::frame::protocol::{parse_sample, TelemetrySample, FRAME_DELIMITER, LOG_HEADER};

/// A row that does not satisfy the consumer contract
#[derive(Debug, Error)]
pub enum ReadError {
    /// Log file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Row has the wrong number of columns or a non-numeric column
    #[error("line {line}: {reason}")]
    BadRow { line: usize, reason: String },
}

/// Read every data row of a telemetry log
///
/// Header rows are skipped wherever they appear, so logs written with the
/// `every_start` header policy parse as well. Blank lines are ignored.
///
/// # Errors
///
/// Returns error on the first row with fewer/more than 11 columns or a
/// non-numeric token. Line numbers are 1-based.
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<Vec<TelemetrySample>, ReadError> {
    let contents = std::fs::read_to_string(path)?;
    parse_samples(&contents)
}

/// Parse log contents already in memory
pub fn parse_samples(contents: &str) -> Result<Vec<TelemetrySample>, ReadError> {
    let mut samples = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line == LOG_HEADER {
            continue;
        }

        samples.push(parse_row(line, idx + 1)?);
    }

    Ok(samples)
}

fn parse_row(line: &str, line_no: usize) -> Result<TelemetrySample, ReadError> {
    let columns: Vec<&str> = line.split(FRAME_DELIMITER).collect();

    parse_sample(&columns).map_err(|e| ReadError::BadRow {
        line: line_no,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = "40.4168,-3.7038,0.1,0.2,9.8,0.01,0.02,0.03,20,21,22";

    #[test]
    fn test_parse_skips_header() {
        let contents = format!("{}\n{}\n", LOG_HEADER, ROW);
        let samples = parse_samples(&contents).unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].latitude, 40.4168);
        assert_eq!(samples[0].mag, [20.0, 21.0, 22.0]);
    }

    #[test]
    fn test_parse_skips_repeated_headers() {
        let contents = format!("{h}\n{r}\n{h}\n{r}\n", h = LOG_HEADER, r = ROW);
        let samples = parse_samples(&contents).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_parse_rejects_short_row() {
        let contents = format!("{}\n1,2,3\n", LOG_HEADER);
        match parse_samples(&contents) {
            Err(ReadError::BadRow { line, reason }) => {
                assert_eq!(line, 2);
                assert_eq!(reason, "expected 11 fields, found 3");
            }
            other => panic!("Expected BadRow, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_text_column() {
        let contents = format!("{}\n{}\n", LOG_HEADER, ROW.replace("9.8", "n/a"));
        match parse_samples(&contents) {
            Err(ReadError::BadRow { reason, .. }) => assert!(reason.contains("field 4"), "reason: {}", reason),
            other => panic!("Expected BadRow, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_handles_crlf() {
        let contents = format!("{}\r\n{}\r\n", LOG_HEADER, ROW);
        assert_eq!(parse_samples(&contents).unwrap().len(), 1);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_samples("/nonexistent/telemetry/datos.csv");
        assert!(matches!(result, Err(ReadError::Io(_))));
    }
}
