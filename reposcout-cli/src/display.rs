use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reposcout::progress::{ProgressReporter, ProgressUpdate, DISPLAY_PATH_CHARS};
use reposcout::results::{ScanOutcome, ScanSummary};
use std::path::Path;

/// Creates the scan progress bar, drawn on stderr
pub fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar
}

/// Feeds throttled scan progress into an indicatif bar
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, update: &ProgressUpdate) {
        self.bar.set_length(update.total_files as u64);
        self.bar.set_position(update.files_scanned as u64);
        self.bar.set_message(format_message(update));
    }
}

fn format_message(update: &ProgressUpdate) -> String {
    let path = update.display_path(DISPLAY_PATH_CHARS);
    if path.is_empty() {
        format!("{} matches", update.matches_found)
    } else {
        format!("{} matches  {}", update.matches_found, path)
    }
}

/// Prints match records grouped by file
pub fn print_records(outcome: &ScanOutcome) {
    let mut current: Option<&Path> = None;
    for record in outcome.sorted_records() {
        if current != Some(record.path.as_path()) {
            println!("\n{}", record.path.display().to_string().blue());
            current = Some(record.path.as_path());
        }
        println!("{}: {}", record.line_number.to_string().green(), record.line);

        if let Some(context) = &record.context {
            for line in context.lines() {
                println!("    {}", line.dimmed());
            }
            println!("    {}", "--".dimmed());
        }
    }
}

pub fn print_summary(summary: &ScanSummary) {
    let headline = format!(
        "Found {} matches in {} files",
        summary.match_count, summary.files_with_matches
    );
    if summary.cancelled {
        println!("\n{} ({})", headline, "scan cancelled".yellow());
    } else {
        println!("\n{}", headline);
    }
    println!("{}", summary);
}
