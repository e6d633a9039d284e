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

/// Print a table from a list of rows, or a note when there are none
pub fn print_table<T: Tabled>(rows: &[T], empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an error message with its full cause chain
pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {:#}", "✗".red().bold(), error);
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
}

/// Format bytes with binary suffixes
pub fn format_bytes(bytes: i64) -> String {
    const KI: f64 = 1024.0;
    const MI: f64 = KI * 1024.0;
    const GI: f64 = MI * 1024.0;

    let value = bytes as f64;
    let magnitude = value.abs();
    if magnitude >= GI {
        format!("{:.2}Gi", value / GI)
    } else if magnitude >= MI {
        format!("{:.2}Mi", value / MI)
    } else if magnitude >= KI {
        format!("{:.2}Ki", value / KI)
    } else {
        format!("{}B", bytes)
    }
}

/// Format millicores as cores from one core up, millicores below
pub fn format_cpu(millicores: i64) -> String {
    if millicores.abs() >= 1000 {
        format!("{:.2}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format a percentage with two decimals
pub fn format_percent(pct: f64) -> String {
    format!("{:.2}%", pct)
}

/// Color a percentage by how close it is to (or past) capacity
pub fn color_percent(pct: f64) -> String {
    let formatted = format_percent(pct);
    if pct > 100.0 {
        formatted.red().bold().to_string()
    } else if pct >= 80.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}
