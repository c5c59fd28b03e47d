use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use url::Url;

use super::cache::{Cache, InMemoryCache};
use super::context::Context;
use super::logger::{Logger, TracingLogger};
use super::retry::{self, RetryPolicy};
use super::transport::Transport;
use crate::core::backoff::Backoff;
use crate::core::cache_control::CacheControl;
use crate::data::{ClientConfig, DEFAULT_CACHE_TTL, Request, Response, default_cache_key};
use crate::error::{Error, Result};

/// Derives the cache key for a request.
pub type CacheKeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Executes requests through a [`Transport`] with retries and response caching.
///
/// Cloning is cheap and every clone shares the same transport and cache.
pub struct Client<T, C = InMemoryCache> {
    inner: Arc<ClientInner<T, C>>,
}

struct ClientInner<T, C> {
    transport:     T,
    cache:         C,
    cache_enabled: bool,
    cache_ttl:     Duration,
    cache_key:     CacheKeyFn,
    retry:         RetryPolicy,
    logger:        Arc<dyn Logger>,
}

impl<T, C> Clone for Client<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, C> fmt::Debug for Client<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("cache_enabled", &self.inner.cache_enabled)
            .field("cache_ttl", &self.inner.cache_ttl)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Client<T> {
    /// A client with default retry settings and caching disabled.
    pub fn new(transport: T) -> Self { Self::builder(transport).build() }

    pub fn builder(transport: T) -> ClientBuilder<T> { ClientBuilder::new(transport) }
}

impl<T: Transport, C: Cache> Client<T, C> {
    pub fn request(&self, method: Method, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> {
        let inner = Url::parse(url.as_ref())
            .map(|url| self.transaction(Request::new(method, url)))
            .map_err(Error::from);
        RequestBuilder { client: self, inner }
    }

    pub fn get(&self, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> { self.request(Method::GET, url) }

    pub fn post(&self, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> { self.request(Method::POST, url) }

    pub fn put(&self, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> { self.request(Method::PUT, url) }

    pub fn patch(&self, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> { self.request(Method::PATCH, url) }

    pub fn delete(&self, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> { self.request(Method::DELETE, url) }

    pub fn head(&self, url: impl AsRef<str>) -> RequestBuilder<'_, T, C> { self.request(Method::HEAD, url) }

    /// Bind `request` to a snapshot of this client's retry policy.
    pub fn transaction(&self, request: Request) -> Transaction {
        Transaction {
            request,
            retry: self.inner.retry.clone(),
            context: Context::background(),
            timeout: None,
            cache: CacheSettings::default(),
        }
    }

    pub fn cache(&self) -> &C { &self.inner.cache }

    pub fn transport(&self) -> &T { &self.inner.transport }

    /// Run one transaction: serve it from the cache when possible, otherwise
    /// send it through the retry loop and cache a successful response.
    pub async fn execute(&self, transaction: Transaction) -> Result<Response> {
        let Transaction {
            request,
            mut retry,
            context,
            timeout,
            cache,
        } = transaction;
        let context = match timeout {
            Some(timeout) => context.with_timeout(timeout),
            None => context,
        };
        let ctx = &context;
        let inner = &*self.inner;
        let logger = &*inner.logger;

        logger.info(ctx, format_args!("{} {} started", request.method, request.url));

        let key = if cache.enabled.unwrap_or(inner.cache_enabled) && request.is_cacheable() {
            let key_fn = cache.key.as_ref().unwrap_or(&inner.cache_key);
            Some(key_fn(&request))
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(hit) = inner.cache.get(key).await {
                logger.info(ctx, format_args!(
                    "{} {} served from cache ({})",
                    request.method, request.url, hit.status
                ));
                return Ok(hit);
            }
            logger.debug(ctx, format_args!("cache miss for {key}"));
        }

        let mut response = match retry::run(&inner.transport, &request, &mut retry, ctx, logger).await {
            Ok(response) => response,
            Err(err) => {
                logger.info(ctx, format_args!("{} {} failed: {err}", request.method, request.url));
                return Err(err);
            }
        };

        if let Some(key) = key {
            let default_ttl = cache.ttl.unwrap_or(inner.cache_ttl);
            self.store(ctx, &key, &mut response, default_ttl).await;
        }

        logger.info(ctx, format_args!(
            "{} {} completed with {}",
            request.method, request.url, response.status
        ));
        Ok(response)
    }

    /// Cache a successful response. Failures are logged and never surface.
    async fn store(&self, ctx: &Context, key: &str, response: &mut Response, default_ttl: Duration) {
        let inner = &*self.inner;
        let control = CacheControl::from_headers(&response.headers);
        if !control.is_storable() {
            inner.logger.debug(ctx, format_args!("not caching {key}: no-store"));
            return;
        }

        let ttl = control.ttl().unwrap_or(default_ttl);
        if ttl.is_zero() {
            return;
        }

        match inner.cache.set_ttl(key, response, ttl).await {
            Ok(()) => inner.logger.debug(ctx, format_args!("cached {key} for {ttl:?}")),
            Err(err) => inner.logger.error(ctx, format_args!("failed to cache {key}: {err}")),
        }
    }
}

pub struct ClientBuilder<T, C = InMemoryCache> {
    transport:     T,
    cache:         C,
    cache_enabled: bool,
    cache_ttl:     Duration,
    cache_key:     CacheKeyFn,
    retry:         RetryPolicy,
    logger:        Arc<dyn Logger>,
}

impl<T: Transport> ClientBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: InMemoryCache::new(),
            cache_enabled: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_key: Arc::new(default_cache_key),
            retry: RetryPolicy::default(),
            logger: Arc::new(TracingLogger),
        }
    }
}

impl<T: Transport, C: Cache> ClientBuilder<T, C> {
    /// Use `cache` as the response store. Also enables caching.
    pub fn cache<C2: Cache>(self, cache: C2) -> ClientBuilder<T, C2> {
        ClientBuilder {
            transport: self.transport,
            cache,
            cache_enabled: true,
            cache_ttl: self.cache_ttl,
            cache_key: self.cache_key,
            retry: self.retry,
            logger: self.logger,
        }
    }

    #[must_use]
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// TTL for responses without a usable `max-age`.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn cache_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.cache_key = Arc::new(key);
        self
    }

    /// Replace the default retry policy entirely.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.retry = self.retry.backoff(backoff);
        self
    }

    #[must_use]
    pub fn success_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.retry = self.retry.success_statuses(statuses);
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = self.retry.max_attempts(max_attempts);
        self
    }

    #[must_use]
    pub fn max_elapsed_time(mut self, max_elapsed_time: Duration) -> Self {
        self.retry = self.retry.max_elapsed_time(max_elapsed_time);
        self
    }

    #[must_use]
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Error, Duration) + Send + Sync + 'static,
    {
        self.retry = self.retry.on_retry(observer);
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Apply file-based settings. Replaces the retry policy, so call this
    /// before the individual retry setters.
    pub fn config(mut self, config: &ClientConfig) -> Result<Self> {
        self.cache_enabled = config.cache.enabled;
        self.cache_ttl = config.cache.ttl();
        self.retry = RetryPolicy::from_config(&config.retry)?;
        Ok(self)
    }

    pub fn build(self) -> Client<T, C> {
        Client {
            inner: Arc::new(ClientInner {
                transport:     self.transport,
                cache:         self.cache,
                cache_enabled: self.cache_enabled,
                cache_ttl:     self.cache_ttl,
                cache_key:     self.cache_key,
                retry:         self.retry,
                logger:        self.logger,
            }),
        }
    }
}

/// Per-request overrides of the client's cache settings.
#[derive(Clone, Default)]
pub struct CacheSettings {
    pub enabled: Option<bool>,
    pub ttl:     Option<Duration>,
    pub key:     Option<CacheKeyFn>,
}

impl fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSettings")
            .field("enabled", &self.enabled)
            .field("ttl", &self.ttl)
            .field("key", &self.key.is_some())
            .finish()
    }
}

/// One call: the request plus the retry, cancellation and cache settings it
/// runs with. Consumed by [`Client::execute`].
#[derive(Debug, Clone)]
pub struct Transaction {
    pub request: Request,
    pub retry:   RetryPolicy,
    pub context: Context,
    /// Bound on the whole call, counted from when it is executed.
    pub timeout: Option<Duration>,
    pub cache:   CacheSettings,
}

/// Builder returned by the verb methods on [`Client`].
///
/// Errors from building the request are held until [`send`](Self::send).
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder<'a, T, C> {
    client: &'a Client<T, C>,
    inner:  Result<Transaction>,
}

impl<T: Transport, C: Cache> RequestBuilder<'_, T, C> {
    fn map(mut self, f: impl FnOnce(&mut Transaction) -> Result<()>) -> Self {
        if let Ok(transaction) = &mut self.inner {
            if let Err(err) = f(transaction) {
                self.inner = Err(err);
            }
        }
        self
    }

    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.map(|tx| {
            let name = HeaderName::try_from(key).map_err(|e| invalid(e.into()))?;
            let value = HeaderValue::try_from(value).map_err(|e| invalid(e.into()))?;
            tx.request.headers.append(name, value);
            Ok(())
        })
    }

    /// Merge `headers` into the request, replacing existing values of the same name.
    pub fn headers(self, headers: HeaderMap) -> Self {
        self.map(|tx| {
            tx.request.headers.extend(headers);
            Ok(())
        })
    }

    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.map(|tx| {
            tx.request.body = Some(body.into());
            Ok(())
        })
    }

    /// Apply an arbitrary change to the request before it is sent.
    pub fn with<F>(self, mutate: F) -> Self
    where
        F: FnOnce(&mut Request) -> Result<()>,
    {
        self.map(|tx| mutate(&mut tx.request))
    }

    pub fn context(self, context: Context) -> Self {
        self.map(|tx| {
            tx.context = context;
            Ok(())
        })
    }

    /// Bound the whole call, retries included. The clock starts at
    /// [`send`](Self::send), not when the builder is configured.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|tx| {
            tx.timeout = Some(timeout);
            Ok(())
        })
    }

    pub fn retry(self, policy: RetryPolicy) -> Self {
        self.map(|tx| {
            tx.retry = policy;
            Ok(())
        })
    }

    pub fn cache(self, enabled: bool) -> Self {
        self.map(|tx| {
            tx.cache.enabled = Some(enabled);
            Ok(())
        })
    }

    pub fn cache_ttl(self, ttl: Duration) -> Self {
        self.map(|tx| {
            tx.cache.ttl = Some(ttl);
            Ok(())
        })
    }

    pub fn cache_key<F>(self, key: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.map(|tx| {
            tx.cache.key = Some(Arc::new(key));
            Ok(())
        })
    }

    pub fn build(self) -> Result<Transaction> { self.inner }

    pub async fn send(self) -> Result<Response> {
        let transaction = self.inner?;
        self.client.execute(transaction).await
    }
}

fn invalid(e: http::Error) -> Error { Error::from(e) }
