//! `Link` header pagination (RFC 8288)
//!
//! Canvas-style APIs advertise the following page as
//! `<https://host/api/v1/...&page=2>; rel="next"` among other relations.

use reqwest::header::{HeaderMap, LINK};

/// Upper bound on pages followed for a single collection.
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Extract the `rel="next"` target from a `Link` header value.
pub fn next_link(header: &str) -> Option<&str> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_ascii_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });
        is_next.then_some(target)
    })
}

/// Next page URL from response headers, if any.
///
/// Multiple `Link` headers are allowed; the first `next` wins.
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(next_link)
        .map(String::from)
}
