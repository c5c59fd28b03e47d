//! HTTP request execution with retry/backoff and response caching.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Requests, responses, bodies and serializable configuration
//! - [`core`] - Pure logic: backoff intervals, outcome classification, `Cache-Control`
//! - [`effects`] - I/O behind traits: [`Transport`], [`Cache`] and the [`Client`]
//!
//! # Behaviour
//!
//! - **Retries**: every attempt is classified against an allow-list of success
//!   statuses; anything else is retried with backoff until the attempt or
//!   elapsed-time budget runs out.
//! - **429**: a numeric `Retry-After` replaces the backoff interval for that
//!   retry. A malformed one fails the request immediately.
//! - **Caching**: successful `GET` responses are stored for their `max-age`
//!   (or the configured TTL) and replayed without touching the transport.
//! - **Cancellation**: a [`Context`] aborts in-flight attempts and retry sleeps.
//!
//! ```no_run
//! # async fn run() -> tenaci::Result<()> {
//! use std::time::Duration;
//! use tenaci::{Client, ReqwestTransport};
//!
//! let transport = ReqwestTransport::new().map_err(|e| tenaci::Error::Transport(e.into()))?;
//! let client = Client::builder(transport)
//!     .cache_enabled(true)
//!     .max_attempts(3)
//!     .build();
//!
//! let body = client
//!     .get("https://api.example.com/items")
//!     .timeout(Duration::from_secs(10))
//!     .send()
//!     .await?
//!     .text()
//!     .await
//!     .map_err(tenaci::Error::Transport)?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use crate::core::{
    Backoff, CacheControl, Classification, Classifier, ConstantBackoff, ExponentialBackoff,
    Outcome, StatusClassifier, ZeroBackoff,
};
pub use data::{
    BackoffConfig, Body, CacheConfig, ClientConfig, Request, Response, RetryConfig,
    default_cache_key,
};
#[cfg(feature = "reqwest")]
pub use effects::ReqwestTransport;
pub use effects::{
    Cache, CacheSettings, CancelHandle, Client, ClientBuilder, Context, InMemoryCache, Logger,
    NoopLogger, RequestBuilder, RetryPolicy, Transaction, Transport, TracingLogger,
};
pub use error::{BoxError, CacheError, Error, Result};
