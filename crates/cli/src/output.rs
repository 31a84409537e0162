//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use vv_common::{Outcome, Run, RunStatus, Script, Srs, TestCase, TestResult};

use crate::client::LatestReport;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table<T: TableDisplay>(items: &[&T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

fn print_plain<T: TableDisplay>(item: &T) {
    for (header, value) in T::headers().iter().zip(item.row().iter()) {
        println!("{}: {}", header, value);
    }
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", table(&[item])),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Plain => print_plain(item),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let refs: Vec<&T> = items.iter().collect();
            println!("{}", table(&refs));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                print_plain(item);
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

/// First line of a possibly long text, shortened to `max` chars
fn excerpt(value: &Option<String>, max: usize) -> String {
    let Some(text) = value else {
        return "-".to_string();
    };
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        format!("{}…", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}

fn colored_status(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => status.to_string().green().to_string(),
        RunStatus::Failed => status.to_string().red().to_string(),
        _ => status.to_string().yellow().to_string(),
    }
}

fn colored_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Passed => outcome.to_string().green().to_string(),
        Outcome::Failed | Outcome::Error => outcome.to_string().red().to_string(),
        _ => outcome.to_string().yellow().to_string(),
    }
}

fn timestamp(ts: &Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl TableDisplay for Srs {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Title", "Description", "Content", "Created"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            opt(&self.description),
            excerpt(&self.content, 60),
            timestamp(&Some(self.created_at)),
        ]
    }
}

impl TableDisplay for TestCase {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "SRS", "Name", "Priority", "Tags"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.srs_id.to_string(),
            self.name.clone(),
            opt(&self.priority),
            opt(&self.tags),
        ]
    }
}

impl TableDisplay for Script {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Test Case", "Framework", "File"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.test_case_id.to_string(),
            format!("{}/{}", self.language, self.framework),
            opt(&self.file_path),
        ]
    }
}

impl TableDisplay for Run {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Label", "Status", "Started", "Finished", "Triggered By"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            opt(&self.label),
            colored_status(self.status),
            timestamp(&self.started_at),
            timestamp(&self.finished_at),
            opt(&self.triggered_by),
        ]
    }
}

impl TableDisplay for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Script", "Outcome", "Duration", "Message"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.script_id.to_string(),
            colored_outcome(self.outcome),
            self.duration_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "-".to_string()),
            excerpt(&self.message, 80),
        ]
    }
}

impl TableDisplay for LatestReport {
    fn headers() -> Vec<&'static str> {
        vec!["Run", "Status", "Passed", "Failed", "Skipped", "Errors", "Total"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.run_id.to_string(),
            colored_status(self.status),
            self.summary.passed.to_string(),
            self.summary.failed.to_string(),
            self.summary.skipped.to_string(),
            self.summary.errors.to_string(),
            self.summary.total.to_string(),
        ]
    }
}
