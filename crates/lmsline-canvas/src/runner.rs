//! Report runners: aggregate, then export
//!
//! Aggregation finishes completely before the first file is written, so an
//! upstream failure leaves the output directory untouched.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use lmsline_core::{ApiClient, ExportOutcome, ExportSet, Exporter, ProgressContext};

use crate::aggregate;
use crate::api::CanvasApi;
use crate::config::Config;
use crate::records::MissingAssignmentRow;

/// Report variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Courses, students, assignments, submissions, enrollments
    Extract,
    /// Students with missing assignments, per course
    MissingAssignments,
}

impl Report {
    pub fn name(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::MissingAssignments => "missing",
        }
    }
}

/// Export name of the missing-assignments report.
pub const MISSING_EXPORT: &str = "students_with_missing_assignments";

/// Report execution summary
#[derive(Debug)]
pub struct Summary {
    pub report: Report,
    pub year: i32,
    /// Entity counts in export order
    pub counts: Vec<(&'static str, usize)>,
    pub requests: usize,
    pub exports: ExportOutcome,
    pub elapsed: Duration,
}

fn connect(config: &Config) -> Result<CanvasApi> {
    let client =
        ApiClient::new(config.client_config()).context("Failed to build HTTP client")?;
    Ok(CanvasApi::new(
        client,
        config.account_id.clone(),
        config.student_role_id,
    ))
}

/// Run the extract report: five tables.
pub async fn run_extract(config: &Config, progress: &ProgressContext) -> Result<Summary> {
    let start = Instant::now();
    let api = connect(config)?;
    log::info!(
        "Extracting {} for {} (buckets: {})",
        config.base_url,
        config.year,
        config
            .buckets
            .iter()
            .map(|b| b.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let data = aggregate::extract(&api, config.year, &config.buckets, progress)
        .await
        .context("Extract aborted, nothing exported")?;

    let exporter = Exporter::new(&config.output_dir, config.delimiter);
    let mut exports = ExportSet::new(&exporter);
    exports
        .add("courses", &data.courses)
        .add("students", &data.students)
        .add("assignments", &data.assignments)
        .add("submissions", &data.submissions)
        .add("enrollments", &data.enrollments);

    let summary = Summary {
        report: Report::Extract,
        year: config.year,
        counts: vec![
            ("courses", data.courses.len()),
            ("students", data.students.len()),
            ("assignments", data.assignments.len()),
            ("submissions", data.submissions.len()),
            ("enrollments", data.enrollments.len()),
        ],
        requests: api.client().request_count(),
        exports: exports.finish(),
        elapsed: start.elapsed(),
    };
    log_summary(&summary);
    Ok(summary)
}

/// Run the missing-assignments report: one table.
pub async fn run_missing(config: &Config, progress: &ProgressContext) -> Result<Summary> {
    let start = Instant::now();
    let api = connect(config)?;
    log::info!(
        "Collecting missing assignments from {} for {}",
        config.base_url,
        config.year
    );

    let courses = aggregate::missing_assignments(&api, config.year, progress)
        .await
        .context("Missing-assignments report aborted, nothing exported")?;
    let rows: Vec<MissingAssignmentRow<'_>> = courses.iter().flat_map(|c| c.rows()).collect();

    let exporter = Exporter::new(&config.output_dir, config.delimiter);
    let mut exports = ExportSet::new(&exporter);
    exports.add(MISSING_EXPORT, &rows);

    let summary = Summary {
        report: Report::MissingAssignments,
        year: config.year,
        counts: vec![("courses", courses.len()), ("students", rows.len())],
        requests: api.client().request_count(),
        exports: exports.finish(),
        elapsed: start.elapsed(),
    };
    log_summary(&summary);
    Ok(summary)
}

fn log_summary(summary: &Summary) {
    log::info!("=== {} report summary ({}) ===", summary.report.name(), summary.year);
    for (name, count) in &summary.counts {
        log::info!("{name}: {count}");
    }
    log::info!(
        "Requests: {}, time: {:.1}s",
        summary.requests,
        summary.elapsed.as_secs_f64()
    );
    if !summary.exports.is_complete() {
        log::warn!(
            "{} of {} exports failed",
            summary.exports.failed.len(),
            summary.exports.failed.len() + summary.exports.written.len()
        );
    }
}
