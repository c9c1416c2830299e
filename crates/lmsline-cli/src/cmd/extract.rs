//! Extract subcommand - courses, students, assignments, submissions, enrollments

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use lmsline_core::SharedProgress;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Reporting year (default: config report.year or YEAR_TO_REPORT)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also fetch assignments in the `unsubmitted` bucket
    #[arg(long)]
    pub include_unsubmitted: bool,
}

pub fn run(args: ExtractArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let run_args = config.run_args(args.year, args.output, args.include_unsubmitted);
    let canvas = lmsline_canvas::Config::try_from(run_args)?;

    let summary = super::runtime()?.block_on(lmsline_canvas::run_extract(&canvas, progress))?;
    super::report(&summary)
}
