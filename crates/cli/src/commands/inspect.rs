//! Telemetry inspection command

use anyhow::Result;
use falconeye_lib::anomaly::StatisticalBaseline;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_value, print_header, print_info, OutputFormat};
use crate::telemetry;

/// Per-channel statistics
#[derive(Debug, Tabled, Serialize)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std Dev")]
    std_dev: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

/// Show the channels of a telemetry file with whole-table statistics
pub fn inspect(path: &Path, format: OutputFormat) -> Result<()> {
    let loaded = telemetry::load(path, &[])?;
    let table = &loaded.table;

    let mut rows = Vec::new();
    for channel in table.channels() {
        let values = table.channel_values(channel)?;
        let (mean, std_dev) = match StatisticalBaseline::from_values(&values, 1.0) {
            Ok(baseline) => (format_value(baseline.mean), format_value(baseline.std_dev)),
            Err(_) => ("-".to_string(), "-".to_string()),
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        rows.push(ChannelRow {
            channel: channel.to_string(),
            mean,
            std_dev,
            min: format_value(min),
            max: format_value(max),
        });
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            print_header("Telemetry Channels");
            println!("Source:  {}", path.display());
            println!("Samples: {}", table.len());
            if loaded.dropped_rows > 0 {
                print_info(&format!("{} rows dropped (non-numeric)", loaded.dropped_rows));
            }
            println!();

            let rendered = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", rendered);
        }
    }

    Ok(())
}
