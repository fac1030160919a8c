use atty::Stream;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use crate::audit::finding::Severity;

/// Formatted output for iam-audit
pub struct Output;

impl Output {
    /// Check if colors should be enabled
    pub(crate) fn colors_enabled() -> bool {
        atty::is(Stream::Stdout) && std::env::var("NO_COLOR").is_err()
    }

    /// Disable colors if terminal doesn't support them
    fn disable_colors_if_needed() {
        if !Self::colors_enabled() {
            colored::control::set_override(false);
        }
    }

    /// Initialize output system (call at startup)
    pub fn init() {
        Self::disable_colors_if_needed();
    }

    /// Show a success message
    pub fn success(msg: &str) {
        if Self::colors_enabled() {
            println!("{} {}", "✓".green().bold(), msg.green());
        } else {
            println!("✓ {}", msg);
        }
    }

    /// Show an error message
    pub fn error(msg: &str) {
        if Self::colors_enabled() {
            eprintln!("{} {}", "✗".red().bold(), msg.red());
        } else {
            eprintln!("✗ {}", msg);
        }
    }

    /// Show a warning message
    pub fn warning(msg: &str) {
        if Self::colors_enabled() {
            println!("{} {}", "⚠".yellow().bold(), msg.yellow());
        } else {
            println!("⚠ {}", msg);
        }
    }

    /// Show an info message
    pub fn info(msg: &str) {
        if Self::colors_enabled() {
            println!("{} {}", "ℹ".cyan().bold(), msg.cyan());
        } else {
            println!("ℹ {}", msg);
        }
    }

    /// Show a heading
    pub fn heading(msg: &str) {
        if Self::colors_enabled() {
            println!("\n{}", msg.bold().bright_blue());
        } else {
            println!("\n{}", msg);
        }
    }

    /// Show a list item
    pub fn list_item(item: &str) {
        if Self::colors_enabled() {
            println!("  {} {}", "•".cyan(), item);
        } else {
            println!("  • {}", item);
        }
    }

    /// Create a table for displaying data
    pub fn table() -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Make table responsive to terminal width
        if let Some((_width, _)) = term_size::dimensions() {
            table.set_content_arrangement(ContentArrangement::Dynamic);
        }
        table
    }

    /// Severity cell with the matching color
    pub fn severity_cell(severity: Severity) -> Cell {
        if !Self::colors_enabled() {
            return Cell::new(severity.label());
        }
        let color = match severity {
            Severity::High => comfy_table::Color::Red,
            Severity::Medium => comfy_table::Color::Yellow,
            Severity::Low => comfy_table::Color::Green,
        };
        Cell::new(severity.label()).fg(color)
    }

    /// Create a progress bar for the per-user fetch loop
    pub fn progress_bar(len: u64) -> ProgressBar {
        let pb = ProgressBar::new(len);

        let template = if Self::colors_enabled() {
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}"
        } else {
            "[{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"
        };

        pb.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .unwrap()
                .progress_chars(if Self::colors_enabled() { "#>-" } else { "=>-" }),
        );
        pb
    }

    /// Create a spinner for an indeterminate fetch phase
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb
    }

    /// Show an audit summary line
    pub fn summary(title: &str, count: usize) {
        if Self::colors_enabled() {
            println!(
                "\n{} {} {}",
                "✓".green().bold(),
                title.bold(),
                format!("{} finding(s)", count).green()
            );
        } else {
            println!("\n✓ {} {} finding(s)", title, count);
        }
    }
}
