use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

/// One outbound HTTP call described as plain data.
///
/// The body is kept as `Bytes` so every retry attempt can send an identical
/// copy; cloning a `Request` is cheap apart from the header map.
#[derive(Debug, Clone)]
pub struct Request {
    pub method:  Method,
    pub url:     Url,
    pub headers: HeaderMap,
    pub body:    Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Methods whose responses may be served from and stored in the cache.
    pub fn is_cacheable(&self) -> bool { self.method == Method::GET }
}

/// Cache key used when no key function is configured: the absolute URL.
pub fn default_cache_key(request: &Request) -> String { request.url.as_str().to_string() }
