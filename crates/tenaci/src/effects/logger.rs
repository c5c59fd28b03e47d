use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;

use super::context::Context;

/// Sink for lifecycle messages: request start/end, cache hits and misses,
/// retries and failures.
///
/// Every message comes with the [`Context`] of the call it belongs to, so a
/// logger can report the remaining deadline or tell cancelled calls apart.
/// Loggers only observe. Swapping in [`NoopLogger`] never changes behaviour.
pub trait Logger: Send + Sync {
    fn info(&self, ctx: &Context, args: fmt::Arguments<'_>);
    fn debug(&self, ctx: &Context, args: fmt::Arguments<'_>);
    fn error(&self, ctx: &Context, args: fmt::Arguments<'_>);
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn info(&self, ctx: &Context, args: fmt::Arguments<'_>) { (**self).info(ctx, args) }

    fn debug(&self, ctx: &Context, args: fmt::Arguments<'_>) { (**self).debug(ctx, args) }

    fn error(&self, ctx: &Context, args: fmt::Arguments<'_>) { (**self).error(ctx, args) }
}

/// Forwards to `tracing` events under the `tenaci` target.
///
/// Calls with a deadline carry a `remaining` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

fn remaining(ctx: &Context) -> Option<std::time::Duration> {
    ctx.deadline().map(|deadline| deadline.saturating_duration_since(Instant::now()))
}

impl Logger for TracingLogger {
    fn info(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        tracing::info!(target: "tenaci", remaining = ?remaining(ctx), "{args}")
    }

    fn debug(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "tenaci", remaining = ?remaining(ctx), "{args}")
    }

    fn error(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        tracing::error!(target: "tenaci", remaining = ?remaining(ctx), "{args}")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn info(&self, _: &Context, _: fmt::Arguments<'_>) {}

    fn debug(&self, _: &Context, _: fmt::Arguments<'_>) {}

    fn error(&self, _: &Context, _: fmt::Arguments<'_>) {}
}
