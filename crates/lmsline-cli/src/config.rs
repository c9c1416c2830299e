//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use lmsline_canvas::{Bucket, RunArgs};

/// Global configuration for lmsline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub report: ReportConfig,
    pub output: OutputConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub base_url: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub account_id: Option<String>,
    pub student_role_id: Option<u64>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("CANVAS_BASE_URL").ok(),
            token: std::env::var("CANVAS_ACCESS_TOKEN").ok(),
            account_id: std::env::var("CANVAS_ACCOUNT_ID").ok(),
            student_role_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub year: Option<i32>,
    /// Assignment buckets for the extract report (default: past, overdue)
    pub buckets: Option<Vec<Bucket>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            year: year_from_env("YEAR_TO_REPORT"),
            buckets: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
    /// Single character; `\t` or `tab` for tab-separated output
    pub delimiter: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("./exports"),
            delimiter: ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub per_page: u32,
    /// Pause before every request after the first
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            request_delay_ms: 0,
            timeout_secs: 60,
        }
    }
}

fn year_from_env(var: &str) -> Option<i32> {
    let value = std::env::var(var).ok()?;
    match value.trim().parse() {
        Ok(year) => Some(year),
        Err(_) => {
            log::warn!("Ignoring {var}={value:?}: not a year");
            None
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./lmsline.toml (current directory)
    /// 2. ~/.config/lmsline/config.toml
    ///
    /// If no config file found, returns default config (environment only).
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("lmsline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "lmsline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using environment and defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Settings for one report run; command-line values override the file.
    pub fn run_args(
        &self,
        year: Option<i32>,
        output: Option<PathBuf>,
        include_unsubmitted: bool,
    ) -> RunArgs {
        RunArgs {
            base_url: self.canvas.base_url.clone(),
            token: self.canvas.token.clone(),
            account_id: self.canvas.account_id.clone(),
            year: year.or(self.report.year),
            student_role_id: self.canvas.student_role_id,
            buckets: self.report.buckets.clone(),
            include_unsubmitted,
            per_page: Some(self.http.per_page),
            request_delay_ms: Some(self.http.request_delay_ms),
            timeout_secs: Some(self.http.timeout_secs),
            output_dir: Some(output.unwrap_or_else(|| self.output.default_dir.clone())),
            delimiter: Some(self.output.delimiter.clone()),
        }
    }
}
