//! Pure decision logic for request execution.
//!
//! Nothing in here performs I/O: backoff interval math, classification of
//! attempt outcomes, and `Cache-Control` interpretation.

pub mod backoff;
pub mod cache_control;
pub mod classify;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff, ZeroBackoff};
pub use cache_control::{CacheControl, resolve_ttl};
pub use classify::{
    Classification, Classifier, Outcome, SharedClassifier, StatusClassifier, parse_retry_after,
};
