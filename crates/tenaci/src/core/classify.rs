//! Classification of attempt outcomes into success, retry or failure.
//!
//! Every attempt, whether it produced a response or a transport error, passes
//! through one classifier. The default is [`StatusClassifier`], which accepts
//! an allow-list of success statuses and retries everything else.

use std::sync::Arc;
use std::time::Duration;

use http::{StatusCode, header::RETRY_AFTER};

use crate::data::Response;
use crate::error::{BoxError, Error, Result};

/// What a single attempt produced.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Response(&'a Response),
    TransportError(&'a BoxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    Retryable,
    /// Retry after exactly this delay instead of the backoff interval.
    RetryAfter(Duration),
    Permanent,
}

/// Decides how the retry loop treats an outcome.
///
/// Returning `Err` fails the request immediately with that error.
pub trait Classifier: Send + Sync {
    fn classify(&self, outcome: Outcome<'_>) -> Result<Classification>;
}

impl<F> Classifier for F
where
    F: Fn(Outcome<'_>) -> Result<Classification> + Send + Sync,
{
    fn classify(&self, outcome: Outcome<'_>) -> Result<Classification> { self(outcome) }
}

pub type SharedClassifier = Arc<dyn Classifier>;

#[derive(Debug, Clone)]
pub struct StatusClassifier {
    success: Arc<[StatusCode]>,
}

impl Default for StatusClassifier {
    fn default() -> Self { Self::new([StatusCode::OK]) }
}

impl StatusClassifier {
    pub fn new(success: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            success: success.into_iter().collect(),
        }
    }

    pub fn success_statuses(&self) -> &[StatusCode] { &self.success }
}

impl Classifier for StatusClassifier {
    fn classify(&self, outcome: Outcome<'_>) -> Result<Classification> {
        let response = match outcome {
            Outcome::TransportError(_) => return Ok(Classification::Retryable),
            Outcome::Response(response) => response,
        };

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            let delay = parse_retry_after(response.header(RETRY_AFTER.as_str()).unwrap_or(""))?;
            return Ok(Classification::RetryAfter(delay));
        }

        if self.success.contains(&response.status) {
            Ok(Classification::Success)
        } else {
            Ok(Classification::Retryable)
        }
    }
}

/// Parse a `Retry-After` value as a whole number of seconds.
///
/// HTTP-date values and anything else non-numeric are rejected rather than
/// guessed at.
pub fn parse_retry_after(value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|source| Error::MalformedRetryAfter {
            value: value.to_string(),
            source,
        })
}
