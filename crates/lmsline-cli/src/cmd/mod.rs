//! Subcommands

pub mod extract;
pub mod missing;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use lmsline_canvas::Summary;
use lmsline_core::fmt_num;

/// Single-threaded runtime: every request is awaited in sequence.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Print the run summary on stderr and fail if any export failed.
fn report(summary: &Summary) -> Result<()> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(format!("{} {}", summary.report.name(), summary.year)).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (name, count) in &summary.counts {
        table.add_row(vec![Cell::new(name), Cell::new(fmt_num(*count))]);
    }
    for written in &summary.exports.written {
        table.add_row(vec![
            Cell::new(&written.name),
            Cell::new(format!(
                "{} ({} rows)",
                written.path.display(),
                fmt_num(written.rows)
            )),
        ]);
    }
    for (name, err) in &summary.exports.failed {
        table.add_row(vec![
            Cell::new(name).fg(Color::Red),
            Cell::new(format!("FAILED: {err}")).fg(Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("Requests"),
        Cell::new(fmt_num(summary.requests)),
    ]);
    table.add_row(vec![
        Cell::new("Time"),
        Cell::new(format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ]);
    eprintln!("\n{table}");

    if summary.exports.is_complete() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} export(s) failed: {}",
            summary.exports.failed.len(),
            summary
                .exports
                .failed
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
