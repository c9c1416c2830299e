//! lmsline - CLI for LMS reporting extracts
//!
//! Pulls one reporting year of Canvas data (courses, rosters, assignments,
//! submissions, enrollments, missing assignments) into delimited files.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "lmsline")]
#[command(about = "Canvas LMS reporting extracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./lmsline.toml or ~/.config/lmsline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Export courses, students, assignments, submissions and enrollments
    Extract(cmd::extract::ExtractArgs),
    /// Export students with missing assignments, per course
    Missing(cmd::missing::MissingArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = Arc::new(lmsline_core::ProgressContext::new());

    // TTY: warnings only unless --debug, the stage lines show activity.
    // Otherwise info, logs are the only progress output.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    lmsline_core::init_logging(
        lmsline_core::Verbosity::from_flags(is_tty, cli.debug),
        multi,
    );

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Extract(args) => cmd::extract::run(args, &config, &progress),
        Command::Missing(args) => cmd::missing::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let not_set = || "not set".to_string();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Canvas base URL",
                &config.canvas.base_url.clone().unwrap_or_else(not_set),
            ]);
            table.add_row(vec![
                "Access token",
                if config.canvas.token.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec![
                "Account",
                config.canvas.account_id.as_deref().unwrap_or("self"),
            ]);
            table.add_row(vec![
                "Student role id",
                &config
                    .canvas
                    .student_role_id
                    .unwrap_or(lmsline_canvas::config::DEFAULT_STUDENT_ROLE_ID)
                    .to_string(),
            ]);
            table.add_row(vec![
                "Year",
                &config.report.year.map_or_else(not_set, |y| y.to_string()),
            ]);
            table.add_row(vec![
                "Buckets",
                &config
                    .report
                    .buckets
                    .as_deref()
                    .unwrap_or(&lmsline_canvas::Bucket::DEFAULT[..])
                    .iter()
                    .map(|b| b.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]);
            table.add_row(vec![
                "Output directory",
                &config.output.default_dir.display().to_string(),
            ]);
            table.add_row(vec!["Delimiter", &format!("{:?}", config.output.delimiter)]);
            table.add_row(vec!["Page size", &config.http.per_page.to_string()]);
            table.add_row(vec![
                "Request delay",
                &format!("{}ms", config.http.request_delay_ms),
            ]);
            table.add_row(vec!["Timeout", &format!("{}s", config.http.timeout_secs)]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
