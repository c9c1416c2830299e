//! REST client with bearer auth and transparent pagination.
//!
//! One [`ApiClient`] is built per run and passed down to the resolvers;
//! nothing about the upstream endpoint lives in process-wide state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Url;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::error::UpstreamError;
use crate::pagination::{DEFAULT_MAX_PAGES, next_page_url};

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://school.instructure.com`
    pub base_url: String,
    /// Bearer token, obtained out of band
    pub token: String,
    /// `per_page` sent with the first request of every collection
    pub per_page: u32,
    /// Pause between consecutive requests
    pub request_delay: Duration,
    /// Whole-request timeout
    pub timeout: Duration,
    pub max_pages: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            per_page: 100,
            request_delay: Duration::ZERO,
            timeout: Duration::from_secs(60),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// One decoded page plus the link to the following one.
struct Page<T> {
    records: Vec<T>,
    next: Option<String>,
}

/// HTTP client bound to one base URL and credential.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    per_page: u32,
    request_delay: Duration,
    max_pages: usize,
    requests: AtomicUsize,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("per_page", &self.per_page)
            .field("requests", &self.request_count())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            per_page: config.per_page,
            request_delay: config.request_delay,
            max_pages: config.max_pages,
            requests: AtomicUsize::new(0),
        })
    }

    /// Number of HTTP requests issued so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// GET every page of `path` and concatenate the records in page order.
    ///
    /// Follows `Link: <...>; rel="next"` until absent. The first failing page
    /// fails the whole call; no partial collection is returned. A next link
    /// to another origin is rejected before the token is sent there.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, UpstreamError> {
        let mut url = self.endpoint(path, query)?;
        let origin = url.origin();
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            if pages >= self.max_pages {
                return Err(UpstreamError::PageLimit {
                    path: path.to_string(),
                    pages,
                });
            }

            let page: Page<T> = self.get_page(path, url.clone()).await?;
            pages += 1;
            log::debug!("{path}: page {pages}, {} records", page.records.len());
            records.extend(page.records);

            match page.next {
                Some(next) => {
                    url = url.join(&next).map_err(|e| UpstreamError::Decode {
                        path: path.to_string(),
                        message: format!("bad next link {next:?}: {e}"),
                    })?;
                    if url.origin() != origin {
                        return Err(UpstreamError::Decode {
                            path: path.to_string(),
                            message: format!("next link leaves base origin: {next:?}"),
                        });
                    }
                }
                None => break,
            }
        }

        log::debug!("{path}: {} records over {pages} pages", records.len());
        Ok(records)
    }

    /// First-page URL: base + path + filter query + page size.
    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            UpstreamError::Transport {
                path: path.to_string(),
                message: format!("invalid URL: {e}"),
            }
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("per_page", &self.per_page.to_string());
        }
        Ok(url)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        url: Url,
    ) -> Result<Page<T>, UpstreamError> {
        // Rate limit: delay between consecutive API requests
        if self.requests.fetch_add(1, Ordering::Relaxed) > 0 && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(path, e))?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("{path}: HTTP {status}");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let next = next_page_url(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(path, e))?;
        let records = decode_page(&body).map_err(|message| UpstreamError::Decode {
            path: path.to_string(),
            message,
        })?;

        Ok(Page { records, next })
    }
}

/// Parse a page body as a JSON array of records.
///
/// A 200 carrying `{"errors": ...}` instead of an array is reported with the
/// upstream error payload.
fn decode_page<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, String> {
    serde_json::from_str(body).map_err(|e| {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(obj)) if obj.contains_key("errors") => {
                format!("upstream errors: {}", obj["errors"])
            }
            _ => e.to_string(),
        }
    })
}
