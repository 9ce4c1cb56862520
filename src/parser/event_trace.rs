//! JSON-lines event trace reader.
//!
//! One `TraceEvent` per line; blank lines and lines starting with `#` are
//! skipped. Errors carry the 1-based line number.

use super::events::TraceEvent;
use crate::utils::error::ParseError;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse a JSON-lines trace held in memory
pub fn parse_events(input: &str) -> Result<Vec<TraceEvent>, ParseError> {
    parse_lines(input.lines().map(|l| Ok(l.to_string())))
}

/// Read a JSON-lines trace file
///
/// **Public** - main entry point for parsing
///
/// # Errors
/// * `ParseError::IoError` - File cannot be read
/// * `ParseError::JsonError` - A line is not a valid event
pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<TraceEvent>, ParseError> {
    let path = path.as_ref();
    debug!("Reading trace from: {}", path.display());

    let reader = BufReader::new(File::open(path)?);
    let events = parse_lines(reader.lines())?;

    debug!("Read {} events from {}", events.len(), path.display());
    Ok(events)
}

fn parse_lines(
    lines: impl Iterator<Item = std::io::Result<String>>,
) -> Result<Vec<TraceEvent>, ParseError> {
    let mut events = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| ParseError::JsonError {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}
