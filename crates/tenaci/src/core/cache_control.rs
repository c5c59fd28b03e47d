//! `Cache-Control` parsing and TTL resolution.

use std::time::Duration;

use http::HeaderMap;
use http::header::CACHE_CONTROL;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    /// `Some` only for the first `max-age` directive when it parses as an integer.
    pub max_age:  Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
}

impl CacheControl {
    pub fn parse(header: &str) -> Self {
        let mut control = Self::default();
        let mut seen_max_age = false;

        for directive in header.split(',') {
            let directive = directive.trim();
            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim().trim_matches('"'))),
                None => (directive, None),
            };

            if name.eq_ignore_ascii_case("no-cache") {
                control.no_cache = true;
            } else if name.eq_ignore_ascii_case("no-store") {
                control.no_store = true;
            } else if name.eq_ignore_ascii_case("max-age") && !seen_max_age {
                seen_max_age = true;
                control.max_age = value.and_then(|v| v.parse::<u64>().ok());
            }
        }

        control
    }

    /// Directives from every `Cache-Control` header in the map, joined.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let joined = headers
            .get_all(CACHE_CONTROL)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&joined)
    }

    pub fn is_storable(&self) -> bool { !self.no_store }

    /// A positive `max-age` as a duration.
    pub fn ttl(&self) -> Option<Duration> {
        self.max_age.filter(|&secs| secs > 0).map(Duration::from_secs)
    }
}

/// TTL for a response: its positive `max-age` if valid, otherwise `default`.
pub fn resolve_ttl(headers: &HeaderMap, default: Duration) -> Duration {
    CacheControl::from_headers(headers).ttl().unwrap_or(default)
}
