//! Missing subcommand - students with missing assignments, per course

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use lmsline_core::SharedProgress;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct MissingArgs {
    /// Reporting year (default: config report.year or YEAR_TO_REPORT)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: MissingArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let canvas = lmsline_canvas::Config::try_from(config.run_args(args.year, args.output, false))?;

    let summary = super::runtime()?.block_on(lmsline_canvas::run_missing(&canvas, progress))?;
    super::report(&summary)
}
