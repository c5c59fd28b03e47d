use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use super::body::Body;
use crate::error::BoxError;

/// A response as returned by a transport or served from the cache.
#[derive(Debug)]
pub struct Response {
    pub status:  StatusCode,
    pub headers: HeaderMap,
    pub body:    Body,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn into_body(self) -> Body { self.body }

    pub async fn bytes(self) -> Result<Bytes, BoxError> { self.body.bytes().await }

    pub async fn text(self) -> Result<String, BoxError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[tokio::test]
    async fn header_and_text() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        let response = Response::new(StatusCode::OK, "payload").with_headers(headers);

        assert_eq!(response.header("Retry-After"), Some("5"));
        assert_eq!(response.header("cache-control"), None);
        assert_eq!(response.text().await.unwrap(), "payload");
    }
}
