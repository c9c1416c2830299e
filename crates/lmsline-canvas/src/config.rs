//! Canvas pipeline configuration

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lmsline_core::ClientConfig;

use crate::records::Bucket;

/// Student role id on a stock Canvas instance.
pub const DEFAULT_STUDENT_ROLE_ID: u64 = 3;

/// Required input that is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingBaseUrl,
    MissingToken,
    MissingYear,
    InvalidBaseUrl { url: String, message: String },
    InvalidDelimiter(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBaseUrl => {
                write!(f, "Canvas base URL not set (config canvas.base_url or CANVAS_BASE_URL)")
            }
            Self::MissingToken => write!(
                f,
                "Canvas access token not set (config canvas.token or CANVAS_ACCESS_TOKEN)"
            ),
            Self::MissingYear => {
                write!(f, "report year not set (--year, config report.year or YEAR_TO_REPORT)")
            }
            Self::InvalidBaseUrl { url, message } => {
                write!(f, "invalid base URL {url:?}: {message}")
            }
            Self::InvalidDelimiter(d) => write!(
                f,
                "delimiter must be one ASCII character, not a quote or line break, got {d:?}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Caller-facing settings before validation (plain struct, no clap derive).
#[derive(Debug, Default, Clone)]
pub struct RunArgs {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub account_id: Option<String>,
    pub year: Option<i32>,
    pub student_role_id: Option<u64>,
    pub buckets: Option<Vec<Bucket>>,
    pub include_unsubmitted: bool,
    pub per_page: Option<u32>,
    pub request_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub delimiter: Option<String>,
}

/// Validated configuration for one report run.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub token: String,
    /// Account whose courses are listed (`self` = the token owner's root)
    pub account_id: String,
    pub year: i32,
    pub student_role_id: u64,
    pub buckets: Vec<Bucket>,
    pub per_page: u32,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub delimiter: u8,
}

impl TryFrom<RunArgs> for Config {
    type Error = ConfigError;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        let base_url = non_empty(args.base_url).ok_or(ConfigError::MissingBaseUrl)?;
        validate_base_url(&base_url)?;
        let token = non_empty(args.token).ok_or(ConfigError::MissingToken)?;
        let year = args.year.ok_or(ConfigError::MissingYear)?;

        let mut buckets = args.buckets.unwrap_or_else(|| Bucket::DEFAULT.to_vec());
        if args.include_unsubmitted && !buckets.contains(&Bucket::Unsubmitted) {
            buckets.push(Bucket::Unsubmitted);
        }

        let delimiter = match args.delimiter.as_deref() {
            Some(d) => parse_delimiter(d)?,
            None => b',',
        };

        let defaults = ClientConfig::default();
        Ok(Self {
            base_url,
            token,
            account_id: non_empty(args.account_id).unwrap_or_else(|| "self".to_string()),
            year,
            student_role_id: args.student_role_id.unwrap_or(DEFAULT_STUDENT_ROLE_ID),
            buckets,
            per_page: args.per_page.unwrap_or(defaults.per_page).clamp(1, 100),
            request_delay: args
                .request_delay_ms
                .map_or(defaults.request_delay, Duration::from_millis),
            timeout: args.timeout_secs.map_or(defaults.timeout, Duration::from_secs),
            output_dir: args.output_dir.unwrap_or_else(|| PathBuf::from("./exports")),
            delimiter,
        })
    }
}

impl Config {
    /// Connection settings for this run's [`lmsline_core::ApiClient`].
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            per_page: self.per_page,
            request_delay: self.request_delay,
            timeout: self.timeout,
            ..Default::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_base_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidBaseUrl {
        url: url.to_string(),
        message,
    };
    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// Single-byte delimiter; `\t` and `tab` mean a tab.
///
/// Rejects `"` and line breaks.
pub fn parse_delimiter(s: &str) -> Result<u8, ConfigError> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() && !matches!(c, '"' | '\n' | '\r') => {
                    Ok(c as u8)
                }
                _ => Err(ConfigError::InvalidDelimiter(s.to_string())),
            }
        }
    }
}
