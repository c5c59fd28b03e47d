//! I/O for request execution: the transport seam, the response cache,
//! cancellation contexts, logging and the client that ties them together.

pub mod cache;
pub mod client;
pub mod context;
pub mod logger;
pub mod retry;
pub mod transport;

pub use cache::{Cache, CacheStats, InMemoryCache};
pub use client::{CacheKeyFn, CacheSettings, Client, ClientBuilder, RequestBuilder, Transaction};
pub use context::{CancelHandle, Context};
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use retry::{RetryObserver, RetryPolicy};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::Transport;
