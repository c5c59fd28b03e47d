//! Error types for tenaci.

use std::num::ParseIntError;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Boxed error used for transport and body stream failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("unexpected response status {status}, body: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("response status {status} is not retryable")]
    PermanentStatus { status: StatusCode },

    #[error("rate limited, server asked to retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("failed to parse Retry-After header {value:?} into a valid integer: {source}")]
    MalformedRetryAfter {
        value:  String,
        #[source]
        source: ParseIntError,
    },

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// The HTTP status behind this error, looking through retry exhaustion.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::UnexpectedStatus { status, .. } | Error::PermanentStatus { status } => {
                Some(*status)
            }
            Error::RateLimited { .. } | Error::MalformedRetryAfter { .. } => {
                Some(StatusCode::TOO_MANY_REQUESTS)
            }
            Error::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Number of attempts made before the error was returned, when known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// True for errors caused by the caller's context rather than the server.
    pub fn is_cancellation(&self) -> bool { matches!(self, Error::Cancelled | Error::DeadlineExceeded) }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self { Error::Config(e.to_string()) }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self { Error::InvalidRequest(e.to_string()) }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(e: http::header::InvalidHeaderName) -> Self { Error::InvalidRequest(e.to_string()) }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self { Error::InvalidRequest(e.to_string()) }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to buffer response body: {0}")]
    Body(#[source] BoxError),

    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}
