//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or pretty JSON
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", empty.yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a verdict
pub fn color_verdict(admitted: bool) -> String {
    if admitted {
        "admitted".green().to_string()
    } else {
        "denied".red().to_string()
    }
}

/// Color a pod phase
pub fn color_phase(phase: &str) -> String {
    match phase.to_lowercase().as_str() {
        "running" => phase.green().to_string(),
        "pending" | "terminating" => phase.yellow().to_string(),
        "failed" | "unknown" => phase.red().to_string(),
        _ => phase.to_string(),
    }
}

/// Color the remaining disruption allowance of a budget
pub fn color_allowed(allowed: i32) -> String {
    if allowed > 0 {
        allowed.to_string().green().to_string()
    } else {
        allowed.to_string().red().to_string()
    }
}

/// Render an optional value, with a dash for absent values
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some("50%")), "50%");
        assert_eq!(or_dash(None), "-");
    }

    #[test]
    fn test_color_verdict_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_verdict(true), "admitted");
        assert_eq!(color_verdict(false), "denied");
        assert_eq!(color_allowed(0), "0");
        assert_eq!(color_phase("Running"), "Running");
    }
}
