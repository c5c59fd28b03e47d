//! Cancellation and deadlines for a single call.
//!
//! A [`Context`] travels with a request. When it is cancelled or its deadline
//! passes, the in-flight attempt and any pending retry sleep are abandoned
//! and the call fails with [`Error::Cancelled`] or [`Error::DeadlineExceeded`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::future;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::error::Error;

#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    signals:  Vec<watch::Receiver<bool>>,
}

/// Cancels every [`Context`] derived from the one it was created with.
///
/// Dropping the handle without calling [`cancel`](Self::cancel) leaves the
/// context uncancelled.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) { self.tx.send_replace(true); }

    pub fn is_cancelled(&self) -> bool { *self.tx.borrow() }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self { Self::default() }

    /// Derive a context that is also cancelled through the returned handle.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.signals.push(rx);
        (self, CancelHandle { tx: Arc::new(tx) })
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Derive a context with the earlier of its current deadline and `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// The cancellation error if the context is already done, without waiting.
    pub fn err(&self) -> Option<Error> {
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> Error {
        let cancelled = async {
            if self.signals.is_empty() {
                return future::pending::<()>().await;
            }
            let waits = self.signals.iter().map(|rx| {
                let mut rx = rx.clone();
                Box::pin(async move {
                    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        future::pending::<()>().await;
                    }
                })
            });
            future::select_all(waits).await;
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Error::Cancelled,
            _ = expired => Error::DeadlineExceeded,
        }
    }
}
