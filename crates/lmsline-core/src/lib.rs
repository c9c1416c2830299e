//! lmsline core - Common infrastructure for LMS extraction pipelines
//!
//! This crate provides the REST client with transparent pagination, the
//! delimited-table exporter, and the logging/progress plumbing shared by
//! the source crates and the CLI.

pub mod client;
pub mod error;
pub mod export;
pub mod logging;
pub mod pagination;
pub mod progress;

// Re-exports for convenience
pub use client::{ApiClient, ClientConfig};
pub use error::{ExportError, UpstreamError};
pub use export::{ExportOutcome, ExportSet, Exporter, Table, Written};
pub use logging::{ProgressLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num, step_message};
