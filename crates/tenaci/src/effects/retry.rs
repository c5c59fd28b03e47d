//! The retry loop.
//!
//! Attempts run strictly one after another. Each outcome goes through the
//! policy's classifier, and discarded responses are drained before the next
//! attempt so their connections can be reused.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::time::{self, Instant};

use super::context::Context;
use super::logger::Logger;
use super::transport::Transport;
use crate::core::backoff::{self, Backoff, ExponentialBackoff};
use crate::core::classify::{
    Classification, Classifier, Outcome, SharedClassifier, StatusClassifier,
};
use crate::data::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ELAPSED_TIME, Request, Response, RetryConfig};
use crate::error::{BoxError, Error, Result};

/// How much of a rejected response body is kept for the error message.
const ERROR_BODY_LIMIT: usize = 1024;

/// Called with the error and the chosen wait before every retry sleep.
pub type RetryObserver = Arc<dyn Fn(&Error, Duration) + Send + Sync>;

/// Retry bounds, backoff strategy and outcome classification for a request.
///
/// A client holds one policy as its default and hands every request its own
/// clone, so concurrent requests never share backoff state.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts:     u32,
    max_elapsed_time: Duration,
    backoff:          Box<dyn Backoff>,
    classifier:       SharedClassifier,
    on_retry:         Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts:     0,
            max_elapsed_time: DEFAULT_MAX_ELAPSED_TIME,
            backoff:          Box::new(ExponentialBackoff::new()),
            classifier:       Arc::new(StatusClassifier::default()),
            on_retry:         None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("max_elapsed_time", &self.max_elapsed_time)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn new() -> Self { Self::default() }

    pub fn from_config(config: &RetryConfig) -> Result<Self> {
        config.validate()?;
        let mut policy = Self::default()
            .max_attempts(config.max_attempts)
            .max_elapsed_time(config.max_elapsed_time())
            .success_statuses(config.success_statuses()?);
        policy.backoff = backoff::from_config(&config.backoff);
        Ok(policy)
    }

    /// Total attempts including the first. Zero selects the default of four.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Give up once the next attempt would start later than this after the
    /// first one. Zero removes the bound.
    #[must_use]
    pub fn max_elapsed_time(mut self, max_elapsed_time: Duration) -> Self {
        self.max_elapsed_time = max_elapsed_time;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    #[must_use]
    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Use the status allow-list classifier with these success statuses.
    #[must_use]
    pub fn success_statuses(self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.classifier(StatusClassifier::new(statuses))
    }

    #[must_use]
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Error, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    pub fn effective_max_attempts(&self) -> u32 {
        if self.max_attempts == 0 { DEFAULT_MAX_ATTEMPTS } else { self.max_attempts }
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        (!self.max_elapsed_time.is_zero()).then_some(self.max_elapsed_time)
    }
}

/// Send `request` until it succeeds, fails permanently, or the budget runs out.
pub(crate) async fn run<T: Transport>(
    transport: &T,
    request: &Request,
    policy: &mut RetryPolicy,
    ctx: &Context,
    logger: &dyn Logger,
) -> Result<Response> {
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    policy.backoff.reset();
    let max_attempts = policy.effective_max_attempts();
    let deadline = policy
        .max_elapsed()
        .and_then(|budget| Instant::now().checked_add(budget));
    let mut attempt = 0u32;

    loop {
        let outcome = tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            result = transport.send(request.clone()) => result.map_err(|e| Box::new(e) as BoxError),
        };

        let classification = match &outcome {
            Ok(response) => policy.classifier.classify(Outcome::Response(response)),
            Err(error) => policy.classifier.classify(Outcome::TransportError(error)),
        };

        let (error, delay) = match classification {
            Ok(Classification::Success) => return outcome.map_err(Error::Transport),
            Ok(Classification::Permanent) => {
                return Err(match settle(outcome, ctx).await? {
                    Error::UnexpectedStatus { status, .. } => Error::PermanentStatus { status },
                    other => other,
                });
            }
            Ok(Classification::Retryable) => {
                let error = settle(outcome, ctx).await?;
                (error, policy.backoff.next_backoff())
            }
            Ok(Classification::RetryAfter(delay)) => {
                settle(outcome, ctx).await?;
                (Error::RateLimited { retry_after: delay }, delay)
            }
            Err(err) => {
                settle(outcome, ctx).await?;
                return Err(err);
            }
        };

        attempt += 1;
        let past_deadline = deadline.is_some_and(|deadline| {
            Instant::now()
                .checked_add(delay)
                .is_none_or(|next| next > deadline)
        });

        if attempt >= max_attempts || past_deadline {
            logger.error(ctx, format_args!(
                "{} {} failed after {attempt} attempts: {error}",
                request.method, request.url
            ));
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                last:     Box::new(error),
            });
        }

        if let Some(observer) = &policy.on_retry {
            observer(&error, delay);
        }
        logger.debug(ctx, format_args!(
            "{} {} attempt {attempt} failed: {error}; retrying in {delay:?}",
            request.method, request.url
        ));

        tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            _ = time::sleep(delay) => {}
        }
    }
}

/// Drain a discarded outcome and describe it as an error.
///
/// Only a cancelled context makes this fail.
async fn settle(outcome: std::result::Result<Response, BoxError>, ctx: &Context) -> Result<Error> {
    let response = match outcome {
        Ok(response) => response,
        Err(error) => return Ok(Error::Transport(error)),
    };

    let status = response.status;
    let body = tokio::select! {
        biased;
        err = ctx.done() => return Err(err),
        body = response.body.drain(ERROR_BODY_LIMIT) => body,
    };

    Ok(Error::UnexpectedStatus {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
