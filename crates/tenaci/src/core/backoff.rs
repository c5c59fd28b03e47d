//! Backoff strategies: successive wait intervals between retry attempts.
//!
//! A backoff carries progress in its own counters, so one instance must never
//! drive two retry loops at once. The executor clones the client's backoff for
//! every request and resets it when the loop starts.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::data::BackoffConfig;

pub trait Backoff: Send + Sync {
    /// Wait before the next attempt; advances internal state.
    fn next_backoff(&mut self) -> Duration;

    /// Restore the initial state.
    fn reset(&mut self);

    fn clone_box(&self) -> Box<dyn Backoff>;
}

impl Clone for Box<dyn Backoff> {
    fn clone(&self) -> Self { self.clone_box() }
}

impl fmt::Debug for dyn Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Backoff") }
}

/// Grows the interval by `multiplier` after every call, capped at
/// `max_interval`, with up to `randomization_factor` jitter either side.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval:     Duration,
    multiplier:           f64,
    randomization_factor: f64,
    max_interval:         Duration,
    current:              Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self { Self::new() }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self {
            initial_interval:     Duration::from_millis(500),
            multiplier:           1.5,
            randomization_factor: 0.5,
            max_interval:         Duration::from_secs(60),
            current:              Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn initial_interval(mut self, initial_interval: Duration) -> Self {
        self.initial_interval = initial_interval;
        self.current = initial_interval;
        self
    }

    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        // `f64::max` discards NaN.
        self.multiplier = multiplier.max(1.0);
        self
    }

    #[must_use]
    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        self
    }

    #[must_use]
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    fn jittered(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let picked = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));
        Duration::try_from_secs_f64(picked.max(0.0)).unwrap_or(interval)
    }
}

impl Backoff for ExponentialBackoff {
    fn next_backoff(&mut self) -> Duration {
        let interval = self.current.min(self.max_interval);
        self.current = Duration::try_from_secs_f64(interval.as_secs_f64() * self.multiplier)
            .map_or(self.max_interval, |next| next.min(self.max_interval));
        self.jittered(interval)
    }

    fn reset(&mut self) { self.current = self.initial_interval; }

    fn clone_box(&self) -> Box<dyn Backoff> { Box::new(self.clone()) }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff {
    interval: Duration,
}

impl ConstantBackoff {
    pub fn new(interval: Duration) -> Self { Self { interval } }
}

impl Backoff for ConstantBackoff {
    fn next_backoff(&mut self) -> Duration { self.interval }

    fn reset(&mut self) {}

    fn clone_box(&self) -> Box<dyn Backoff> { Box::new(*self) }
}

/// Retries immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroBackoff;

impl Backoff for ZeroBackoff {
    fn next_backoff(&mut self) -> Duration { Duration::ZERO }

    fn reset(&mut self) {}

    fn clone_box(&self) -> Box<dyn Backoff> { Box::new(*self) }
}

pub fn from_config(config: &BackoffConfig) -> Box<dyn Backoff> {
    match *config {
        BackoffConfig::Exponential {
            initial_ms,
            multiplier,
            randomization_factor,
            max_interval_ms,
        } => Box::new(
            ExponentialBackoff::new()
                .initial_interval(Duration::from_millis(initial_ms))
                .multiplier(multiplier)
                .randomization_factor(randomization_factor)
                .max_interval(Duration::from_millis(max_interval_ms)),
        ),
        BackoffConfig::Constant { interval_ms } => {
            Box::new(ConstantBackoff::new(Duration::from_millis(interval_ms)))
        }
    }
}
