//! Error types shared by the fetch and export layers

/// Failure talking to the upstream REST API.
///
/// Any variant aborts the whole paginated fetch; pages already received are
/// discarded with it.
#[derive(Debug)]
pub enum UpstreamError {
    /// Server answered with a non-success status
    Status { status: u16, path: String },
    /// Connection, TLS or timeout failure before a status was received
    Transport { path: String, message: String },
    /// Page body was not a JSON array of the expected records
    Decode { path: String, message: String },
    /// Server kept returning `next` links past the page cap
    PageLimit { path: String, pages: usize },
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, path } => write!(f, "HTTP {status} from {path}"),
            Self::Transport { path, message } => write!(f, "request to {path} failed: {message}"),
            Self::Decode { path, message } => write!(f, "invalid response from {path}: {message}"),
            Self::PageLimit { path, pages } => {
                write!(f, "{path}: gave up after {pages} pages")
            }
        }
    }
}

impl std::error::Error for UpstreamError {}

impl UpstreamError {
    /// Build from a reqwest error, keeping the status when there is one.
    ///
    /// The request URL is dropped from the message so tokens passed as query
    /// parameters never reach the logs.
    pub fn from_reqwest(path: &str, e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                path: path.to_string(),
            },
            None => Self::Transport {
                path: path.to_string(),
                message: e.without_url().to_string(),
            },
        }
    }

    /// Resource path the failing request was issued for.
    pub fn path(&self) -> &str {
        match self {
            Self::Status { path, .. }
            | Self::Transport { path, .. }
            | Self::Decode { path, .. }
            | Self::PageLimit { path, .. } => path,
        }
    }

    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure writing one named export table.
///
/// Isolated to that table: sibling exports still run.
#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// Record could not be converted to a JSON value
    Serialize(serde_json::Error),
    /// Record serialized to something other than a JSON object
    NotARecord { index: usize, kind: &'static str },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Csv(e) => write!(f, "CSV: {e}"),
            Self::Serialize(e) => write!(f, "serialize: {e}"),
            Self::NotARecord { index, kind } => {
                write!(f, "record {index} is a {kind}, expected an object")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Serialize(e) => Some(e),
            Self::NotARecord { .. } => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}
