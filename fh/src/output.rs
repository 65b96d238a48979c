//! Rendering of forwarded progress for the terminal

use std::fmt::Display;

use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::progress::UnitProgress;
use crate::scheduler::EngineStats;

/// Render one forwarded snapshot
///
/// Returns `None` for quiet snapshots in text mode. JSON mode emits every
/// snapshot as a single line.
pub fn render<K>(progress: &UnitProgress<K>, format: OutputFormat) -> Result<Option<String>>
where
    K: Display + Serialize,
{
    match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(progress).context("Failed to serialize progress")?;
            Ok(Some(line))
        }
        OutputFormat::Text => {
            if progress.snapshot.quiet {
                return Ok(None);
            }
            Ok(Some(render_text(progress)))
        }
    }
}

fn render_text<K: Display>(progress: &UnitProgress<K>) -> String {
    let snapshot = &progress.snapshot;
    let counters = &progress.counters;

    let mut line = format!(
        "[{} running, {} left, {} outstanding] {} {}",
        counters.running_count,
        counters.remaining_count,
        counters.total_outstanding_work,
        progress.unit.to_string().dimmed(),
        snapshot.display.bold(),
    );
    if !snapshot.status.is_empty() {
        line.push_str(&format!(": {}", snapshot.status.cyan()));
    }
    if !snapshot.info.is_empty() {
        line.push_str(&format!(" - {}", snapshot.info));
    }
    if !snapshot.progress.is_none() {
        line.push_str(&format!(" ({}/{})", snapshot.progress.position, snapshot.progress.total));
    }
    if snapshot.is_error() {
        line.push_str(&format!(" {} {}", "error:".red(), snapshot.error));
    }
    line
}

/// One-line summary printed after an engine finishes
pub fn render_summary(stats: &EngineStats) -> String {
    format!(
        "{} {} updates, {} units finished, peak concurrency {}",
        "✓".green(),
        stats.total_forwarded,
        stats.total_exhausted,
        stats.peak_concurrent
    )
}
