//! Telemetry file loading
//!
//! CSV files carry a header row. Column names are trimmed and lower-cased.
//! A `time` column becomes the sample timestamp, otherwise the row index is
//! used. Rows with a non-numeric value in any kept column are dropped.

use anyhow::{bail, Context, Result};
use falconeye_lib::{Sample, TelemetryTable};
use std::path::Path;
use tracing::debug;

/// Name of the optional timestamp column
pub const TIME_COLUMN: &str = "time";

/// A loaded table plus how many input rows were discarded
#[derive(Debug)]
pub struct LoadedTelemetry {
    pub table: TelemetryTable,
    pub dropped_rows: usize,
}

/// Load a CSV or JSON telemetry file
///
/// `required` channels must be present; when non-empty, only those channels
/// are kept. With no requirement, every column holding at least one numeric
/// value is kept.
pub fn load(path: &Path, required: &[String]) -> Result<LoadedTelemetry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read telemetry file {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let table: TelemetryTable =
            serde_json::from_str(&content).context("Failed to parse telemetry JSON")?;
        return Ok(LoadedTelemetry {
            table,
            dropped_rows: 0,
        });
    }

    parse_csv(&content, required)
}

/// Parse CSV text into a table
pub fn parse_csv(content: &str, required: &[String]) -> Result<LoadedTelemetry> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    if headers.is_empty() {
        bail!("CSV is empty");
    }
    let columns: Vec<String> = headers.iter().map(|c| c.to_lowercase()).collect();
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<std::result::Result<Vec<_>, csv::Error>>()
        .context("Failed to read CSV records")?;

    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|r| !columns.iter().any(|c| c == r))
        .collect();
    if !missing.is_empty() {
        bail!("CSV missing required columns: {}", missing.join(", "));
    }

    let time_idx = columns.iter().position(|c| c == TIME_COLUMN);
    let kept: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(idx, name)| {
            if Some(*idx) == time_idx {
                return false;
            }
            if required.is_empty() {
                rows.iter().any(|r| r.get(*idx).and_then(parse_value).is_some())
            } else {
                required.iter().any(|r| r == *name)
            }
        })
        .map(|(idx, _)| idx)
        .collect();

    let mut samples = Vec::with_capacity(rows.len());
    let mut dropped_rows = 0;

    for (row_idx, row) in rows.iter().enumerate() {
        let timestamp = match time_idx {
            Some(idx) => row.get(idx).and_then(parse_value),
            None => Some(row_idx as f64),
        };

        let readings: Option<Vec<(String, f64)>> = kept
            .iter()
            .map(|&idx| {
                row.get(idx)
                    .and_then(parse_value)
                    .map(|v| (columns[idx].clone(), v))
            })
            .collect();

        match (timestamp, readings) {
            (Some(timestamp), Some(readings)) => {
                let sample = readings
                    .into_iter()
                    .fold(Sample::new(timestamp), |s, (name, value)| s.with_reading(name, value));
                samples.push(sample);
            }
            _ => dropped_rows += 1,
        }
    }

    if samples.is_empty() {
        bail!("CSV loaded but no valid numeric rows were found");
    }

    debug!(
        rows = samples.len(),
        dropped = dropped_rows,
        channels = kept.len(),
        "Parsed telemetry CSV"
    );

    Ok(LoadedTelemetry {
        table: TelemetryTable::new(samples)?,
        dropped_rows,
    })
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
