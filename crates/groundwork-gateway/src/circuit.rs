//! Circuit breaker guarding the upstream generation API.
//!
//! The breaker is a single atomic "disabled until" timestamp. Any classified
//! upstream failure pushes it to `now + cooldown`; while `now` is before that
//! instant, callers are turned away without touching the network. There is no
//! half-open probing: the first call after the cooldown simply goes through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::warn;

/// A thread-safe, per-gateway circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    origin: Instant,
    cooldown: Duration,
    /// Milliseconds since `origin` until which the circuit is open. `0` is closed.
    disabled_until_ms: AtomicU64,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given cooldown.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            origin: Instant::now(),
            cooldown,
            disabled_until_ms: AtomicU64::new(0),
        }
    }

    /// Returns the cooldown applied on every trip.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Opens the circuit for one cooldown from now.
    ///
    /// Concurrent trips keep the latest deadline.
    pub fn trip(&self, reason: &str) {
        self.trip_at(Instant::now(), reason);
    }

    /// Opens the circuit for one cooldown from `now`.
    pub fn trip_at(&self, now: Instant, reason: &str) {
        let until = self.millis_since_origin(now + self.cooldown);
        self.disabled_until_ms.fetch_max(until, Ordering::AcqRel);
        warn!(
            reason = %reason,
            cooldown_secs = self.cooldown.as_secs(),
            "Upstream circuit opened"
        );
    }

    /// Returns `true` if calls are currently being turned away.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    /// Returns `true` if the circuit is open at `now`.
    #[must_use]
    pub fn is_open_at(&self, now: Instant) -> bool {
        self.millis_since_origin(now) < self.disabled_until_ms.load(Ordering::Acquire)
    }

    /// Returns how long the circuit stays open, or `None` if it is closed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    /// Returns how long the circuit stays open after `now`.
    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let until = self.disabled_until_ms.load(Ordering::Acquire);
        let now_ms = self.millis_since_origin(now);
        (now_ms < until).then(|| Duration::from_millis(until - now_ms))
    }

    /// Returns the remaining open time rounded up to whole seconds.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.remaining().map(|d| d.as_millis().div_ceil(1000).try_into().unwrap_or(u64::MAX))
    }

    /// Closes the circuit immediately.
    pub fn reset(&self) {
        self.disabled_until_ms.store(0, Ordering::Release);
    }

    fn millis_since_origin(&self, instant: Instant) -> u64 {
        // `+ 1` keeps a trip at the origin instant distinct from "closed".
        u64::try_from(instant.saturating_duration_since(self.origin).as_millis())
            .unwrap_or(u64::MAX - 1)
            .saturating_add(1)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
