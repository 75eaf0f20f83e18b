//! CLI output formatting for every tool.
//!
//! # Output Format
//!
//! ## Estimates (before processing)
//!
//! ```text
//! 001 photo.png → photo.webp
//!     2048.0 KB → ~1638.4 KB at quality 80
//!
//! Total: 2048.00 KB → ~1638.40 KB (saved 20%)
//! ```
//!
//! ## Download report
//!
//! ```text
//! 001 trip/a.jpg → trip/a.png
//!     encoded 812.4 KB (1600x1200)
//! 002 trip/b.jpg → trip/b.png
//!     skipped: The source image could not be decoded: ...
//!
//! Saved converted-folder.zip (1 file, 1 skipped) → out/converted-folder.zip
//! ```
//!
//! Estimates are projections; the download report shows true encoded sizes.
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{Delivery, DownloadReport, ItemOutcome, ProcessedResult};
use crate::imaging::total_saved_percent;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Bytes as kilobytes with a fixed number of decimals.
pub fn format_kb(bytes: f64, decimals: usize) -> String {
    format!("{:.*} KB", decimals, bytes / 1024.0)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Estimates
// ============================================================================

/// Per-file estimate lines followed by the batch totals.
pub fn format_estimates(results: &[ProcessedResult]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, r) in results.iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            r.relative_path,
            r.output_name
        ));
        let detail = match r.format {
            Some(format) if format.is_lossy() => format!(
                "    {} \u{2192} ~{} at quality {}",
                format_kb(r.original_size as f64, 1),
                format_kb(r.estimated_size, 1),
                r.quality.value()
            ),
            Some(_) => format!(
                "    {} \u{2192} ~{}",
                format_kb(r.original_size as f64, 1),
                format_kb(r.estimated_size, 1)
            ),
            None => format!("    {} (unchanged)", format_kb(r.original_size as f64, 1)),
        };
        lines.push(detail);
    }

    if !results.is_empty() {
        let original: f64 = results.iter().map(|r| r.original_size as f64).sum();
        let estimated: f64 = results.iter().map(|r| r.estimated_size).sum();
        lines.push(String::new());
        lines.push(format!(
            "Total: {} \u{2192} ~{} (saved {:.0}%)",
            format_kb(original, 2),
            format_kb(estimated, 2),
            total_saved_percent(original, estimated)
        ));
    }
    lines
}

pub fn print_estimates(results: &[ProcessedResult]) {
    for line in format_estimates(results) {
        println!("{}", line);
    }
}

// ============================================================================
// Download report
// ============================================================================

/// Per-item outcome lines followed by where the download was saved.
pub fn format_download_report(report: &DownloadReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, item) in report.items.iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            item.source,
            item.output
        ));
        let detail = match &item.outcome {
            ItemOutcome::Encoded { size, dimensions } => format!(
                "    encoded {} ({}x{})",
                format_kb(*size as f64, 1),
                dimensions.width,
                dimensions.height
            ),
            ItemOutcome::Passthrough { size } => {
                format!("    copied {}", format_kb(*size as f64, 1))
            }
            ItemOutcome::Skipped { reason } => format!("    skipped: {}", reason),
        };
        lines.push(detail);
    }

    lines.push(String::new());
    match &report.delivery {
        Delivery::Single {
            file_name,
            path,
            size,
        } => lines.push(format!(
            "Saved {} ({}) \u{2192} {}",
            file_name,
            format_kb(*size as f64, 1),
            path.display()
        )),
        Delivery::Archive {
            file_name,
            path,
            entries,
            ..
        } => {
            let skipped = report.skipped().count();
            let mut summary = plural(*entries, "file");
            if skipped > 0 {
                summary.push_str(&format!(", {skipped} skipped"));
            }
            lines.push(format!(
                "Saved {} ({}) \u{2192} {}",
                file_name,
                summary,
                path.display()
            ));
        }
    }
    lines
}

pub fn print_download_report(report: &DownloadReport) {
    for line in format_download_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// AI tools
// ============================================================================

/// Result line for an AI edit written to disk.
pub fn format_ai_result(tool: &str, source: &Path, saved: &Path, bytes: usize) -> Vec<String> {
    vec![
        format!("{} {}", tool, source.display()),
        format!(
            "    Saved {} \u{2192} {}",
            format_kb(bytes as f64, 1),
            saved.display()
        ),
    ]
}

pub fn print_ai_result(tool: &str, source: &Path, saved: &Path, bytes: usize) {
    for line in format_ai_result(tool, source, saved, bytes) {
        println!("{}", line);
    }
}
