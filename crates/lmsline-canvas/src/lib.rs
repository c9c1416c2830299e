//! lmsline Canvas - Canvas LMS report pipeline
//!
//! Pulls courses, rosters, assignments, submissions and enrollments for one
//! reporting year from the Canvas REST API and exports them as delimited
//! tables.
//!
//! # Example
//!
//! ```ignore
//! use lmsline_canvas::{Config, RunArgs, run_extract};
//! use lmsline_core::ProgressContext;
//!
//! let config = Config::try_from(RunArgs {
//!     base_url: Some("https://school.instructure.com".into()),
//!     token: Some(token),
//!     year: Some(2022),
//!     ..Default::default()
//! })?;
//!
//! let summary = runtime.block_on(run_extract(&config, &ProgressContext::new()))?;
//! println!("{} files written", summary.exports.written.len());
//! ```

pub mod aggregate;
pub mod api;
pub mod config;
pub mod records;
pub mod runner;

// Re-exports
pub use aggregate::{Extract, Stage, StageError, StudentSet};
pub use api::CanvasApi;
pub use config::{Config, ConfigError, RunArgs};
pub use records::{
    Assignment, Bucket, Course, CourseWithMissingAssignments, Enrollment, MissingAssignment,
    Student, StudentWithMissingAssignments, Submission,
};
pub use runner::{MISSING_EXPORT, Report, Summary, run_extract, run_missing};
