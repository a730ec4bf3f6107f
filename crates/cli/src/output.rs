//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use vipauto_e2e::playwright::{StepResult, StepStatus};
use vipauto_e2e::runner::TestResult;
use vipauto_e2e::{TestSpec, TestSuiteResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Result", "Duration", "Evidence", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let result = if self.success {
            "✓ passed".green().to_string()
        } else if self.harness_error {
            "✗ harness error".yellow().to_string()
        } else if self.timed_out {
            "✗ timed out".red().to_string()
        } else {
            "✗ failed".red().to_string()
        };
        let evidence = self
            .evidence
            .iter()
            .map(|e| format!("{} ({}x{})", e.path.display(), e.width, e.height))
            .collect::<Vec<_>>()
            .join("\n");
        vec![
            self.name.clone(),
            result,
            format!("{} ms", self.duration_ms),
            evidence,
            self.error.clone().unwrap_or_default(),
        ]
    }
}

impl TableDisplay for StepResult {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Step", "Status", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            StepStatus::Passed => "passed".green().to_string(),
            StepStatus::Failed => "failed".red().to_string(),
            StepStatus::Skipped => "skipped".dimmed().to_string(),
        };
        vec![
            (self.index + 1).to_string(),
            self.step_name.clone(),
            status,
            format!("{} ms", self.duration_ms),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

impl TableDisplay for &TestSpec {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Tags", "Steps", "Visual", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.join(", "),
            self.steps.len().to_string(),
            if self.visual_regression { "yes" } else { "no" }.to_string(),
            self.description.clone(),
        ]
    }
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
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

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("cannot serialise output: {}", e)),
    }
}

/// Print a suite summary; failing tests also get their step breakdown
pub fn print_suite(suite: &TestSuiteResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(suite),
        OutputFormat::Table => {
            println!("{}", table(&suite.results));

            for result in suite.results.iter().filter(|r| !r.success && !r.steps.is_empty()) {
                println!();
                println!("{} {}", "Steps of".bold(), result.name.bold());
                println!("{}", table(&result.steps));
            }

            println!();
            let summary = format!(
                "{} passed, {} failed ({} ms) against {}",
                suite.passed, suite.failed, suite.duration_ms, suite.base_url
            );
            if suite.has_harness_errors() {
                print_error(&format!("{}; {} could not run", summary, suite.harness_errors));
            } else if suite.all_passed() {
                print_success(&summary);
            } else {
                print_error(&summary);
            }
        }
    }
}

/// Print the scenarios found on disk
pub fn print_specs(specs: &[&TestSpec], format: OutputFormat) {
    if specs.is_empty() {
        println!("No specs found.");
        return;
    }
    match format {
        OutputFormat::Json => print_json(specs),
        OutputFormat::Table => println!("{}", table(specs)),
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
