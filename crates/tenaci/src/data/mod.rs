//! Immutable data types for request execution.
//!
//! Requests, responses and their bodies, plus the serializable configuration
//! used to build a client.

pub mod body;
pub mod config;
pub mod request;
pub mod response;

pub use body::{Body, BodyStream, BoxStream};
pub use config::{
    BackoffConfig, CacheConfig, ClientConfig, DEFAULT_CACHE_TTL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_ELAPSED_TIME, RetryConfig,
};
pub use request::{Request, default_cache_key};
pub use response::Response;
