//! Anomaly detection command

use anyhow::Result;
use colored::Colorize;
use falconeye_lib::anomaly::{self, DetectionReport, MlStatus, Severity};
use falconeye_lib::{DetectionConfig, DEFAULT_CONTAMINATION, DEFAULT_K, DEFAULT_SCORE_CHANNEL};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;

use crate::config::Settings;
use crate::output::{
    color_severity, color_status, format_flag, format_optional, format_optional_flag,
    format_value, print_header, print_info, print_warning, OutputFormat,
};
use crate::telemetry;

/// Detection options gathered from flags and environment
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    pub file: PathBuf,
    pub score_channel: Option<String>,
    pub k: Option<f64>,
    pub ml: bool,
    pub features: Vec<String>,
    pub contamination: Option<f64>,
    pub seed: Option<u64>,
    pub trees: Option<usize>,
    pub anomalies_only: bool,
}

impl DetectOptions {
    /// Resolve the run configuration: flags, then settings file, then defaults
    pub fn resolve_config(&self, settings: &Settings) -> DetectionConfig {
        let defaults = DetectionConfig::default();

        let feature_channels = if !self.features.is_empty() {
            self.features.clone()
        } else {
            settings
                .feature_channels
                .clone()
                .unwrap_or(defaults.feature_channels)
        };

        DetectionConfig {
            score_channel: self
                .score_channel
                .clone()
                .or_else(|| settings.score_channel.clone())
                .unwrap_or_else(|| DEFAULT_SCORE_CHANNEL.to_string()),
            k: self.k.or(settings.k).unwrap_or(DEFAULT_K),
            feature_channels,
            contamination: self
                .contamination
                .or(settings.contamination)
                .unwrap_or(DEFAULT_CONTAMINATION),
            enable_ml: self.ml,
            seed: self.seed,
            n_trees: self.trees.unwrap_or(defaults.n_trees),
            max_samples: defaults.max_samples,
        }
    }
}

/// Channels the loader must find in the file
pub fn required_channels(config: &DetectionConfig) -> Vec<String> {
    let mut required = vec![config.score_channel.clone()];
    if config.enable_ml {
        for channel in &config.feature_channels {
            if !required.contains(channel) {
                required.push(channel.clone());
            }
        }
    }
    required
}

/// Row for the verdict table
#[derive(Tabled)]
struct VerdictRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Z")]
    z_score: String,
    #[tabled(rename = "Stat")]
    statistical: String,
    #[tabled(rename = "ML Score")]
    ml_score: String,
    #[tabled(rename = "ML")]
    ml: String,
    #[tabled(rename = "Anomaly")]
    combined: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

#[derive(Serialize)]
struct DetectOutput<'a> {
    source: String,
    dropped_rows: usize,
    ml_unavailable: bool,
    #[serde(flatten)]
    report: &'a DetectionReport,
}

/// Run detection over a telemetry file and print the verdicts
pub fn detect(options: &DetectOptions, settings: &Settings, format: OutputFormat) -> Result<()> {
    let config = options.resolve_config(settings);
    config.validate()?;

    let loaded = telemetry::load(&options.file, &required_channels(&config))?;
    let report = anomaly::run(&loaded.table, &config)?;
    let timestamps = loaded.table.timestamps();

    match format {
        OutputFormat::Json => {
            let output = DetectOutput {
                source: options.file.display().to_string(),
                dropped_rows: loaded.dropped_rows,
                ml_unavailable: report.ml_unavailable(),
                report: &report,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            print_summary(&options.file, &config, &report, loaded.dropped_rows);

            let rows: Vec<VerdictRow> = report
                .verdicts
                .iter()
                .enumerate()
                .filter(|(_, v)| !options.anomalies_only || v.combined_flag)
                .map(|(idx, v)| {
                    let z = report.baseline.z_score(v.statistical_score);
                    VerdictRow {
                        index: idx,
                        time: format_value(timestamps[idx]),
                        score: format_value(v.statistical_score),
                        z_score: format!("{:.2}", z),
                        statistical: format_flag(v.statistical_flag),
                        ml_score: format_optional(v.ml_score),
                        ml: format_optional_flag(v.ml_flag),
                        combined: format_flag(v.combined_flag),
                        severity: if v.statistical_flag {
                            color_severity(Severity::from_z_score(z))
                        } else {
                            "-".to_string()
                        },
                    }
                })
                .collect();

            if rows.is_empty() {
                print_info("No anomalies detected");
                return Ok(());
            }

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

fn print_summary(path: &Path, config: &DetectionConfig, report: &DetectionReport, dropped: usize) {
    let summary = &report.summary;
    let baseline = &report.baseline;

    print_header("FALCONEYE // FLIGHT DIAGNOSTIC");
    println!("Data Source:      {}", path.display().to_string().cyan());
    println!("Total Samples:    {}", summary.total_samples);
    println!("Total Anomalies:  {}", summary.total_anomalies);
    println!("System Status:    {}", color_status(summary.status));
    println!();
    println!("{}", "Statistical".bold());
    println!("{}", "-".repeat(60));
    println!("Channel:          {}", config.score_channel);
    println!(
        "Threshold:        {} (mean {} + {} x std {})",
        format_value(baseline.threshold),
        format_value(baseline.mean),
        baseline.k,
        format_value(baseline.std_dev)
    );
    println!("Flagged:          {}", summary.statistical_anomalies);

    match &report.ml_status {
        MlStatus::Disabled => {}
        MlStatus::Ran { threshold, flagged } => {
            println!();
            println!("{}", "Multivariate".bold());
            println!("{}", "-".repeat(60));
            println!("Features:         {}", config.feature_channels.join(", "));
            println!("Contamination:    {}", config.contamination);
            println!("Threshold:        {}", format_value(*threshold));
            println!("Flagged:          {}", flagged);
        }
        MlStatus::Unavailable { reason, message } => {
            println!();
            print_warning(&format!(
                "Multivariate detector unavailable ({}): {}. Using statistical flags only.",
                reason, message
            ));
        }
    }

    if dropped > 0 {
        print_info(&format!("{} rows dropped (non-numeric)", dropped));
    }
    println!();
}
