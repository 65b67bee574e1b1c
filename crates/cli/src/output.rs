//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use falconeye_lib::anomaly::Severity;
use falconeye_lib::SystemStatus;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the settings file
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a section header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
}

/// Format a reading with a fixed precision
pub fn format_value(value: f64) -> String {
    format!("{:.3}", value)
}

/// Format an optional reading, `-` when absent
pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_else(|| "-".to_string())
}

/// Render a flag, red when set
pub fn format_flag(flag: bool) -> String {
    if flag {
        "YES".red().bold().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

/// Render an optional flag, `-` when the detector did not run
pub fn format_optional_flag(flag: Option<bool>) -> String {
    flag.map(format_flag).unwrap_or_else(|| "-".to_string())
}

/// Color system status
pub fn color_status(status: SystemStatus) -> String {
    match status {
        SystemStatus::Stable => status.to_string().green().bold().to_string(),
        SystemStatus::Warning => status.to_string().yellow().bold().to_string(),
    }
}

/// Color severity
pub fn color_severity(severity: Severity) -> String {
    match severity {
        Severity::Warning => severity.to_string().yellow().to_string(),
        Severity::High => severity.to_string().red().to_string(),
        Severity::Critical => severity.to_string().red().bold().to_string(),
    }
}
