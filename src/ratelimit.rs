// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Advisory pacing of swap traffic.
//!
//! Every in-flight swap holds payload bytes in both tiers at once, so the
//! engine tracks that footprint and asks submitters to briefly sleep when
//! it grows. Pacing is advisory: work already admitted always completes.
//!
//! # Example
//!
//! ```
//! use swap_engine::ratelimit::{RateLimitLevel, SwapRateLimiter};
//!
//! let limiter = SwapRateLimiter::new(1024, 4096);
//! assert_eq!(limiter.level(), RateLimitLevel::None);
//!
//! let guard = limiter.admit(2048);
//! assert_eq!(limiter.level(), RateLimitLevel::Slowdown);
//! drop(guard);
//! assert_eq!(limiter.level(), RateLimitLevel::None);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Pacing tier derived from in-flight swap bytes.
///
/// - **None** (below slowdown watermark): no delay
/// - **Slowdown** (between watermarks): 1-10ms, linear in the overshoot
/// - **Stop** (at or past the stop watermark): the full 10ms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RateLimitLevel {
    None,
    Slowdown,
    Stop,
}

const DELAY_MIN: Duration = Duration::from_millis(1);
const DELAY_MAX: Duration = Duration::from_millis(10);

pub struct SwapRateLimiter {
    inflight_bytes: Arc<AtomicUsize>,
    slowdown_bytes: usize,
    stop_bytes: usize,
}

impl SwapRateLimiter {
    pub fn new(slowdown_bytes: usize, stop_bytes: usize) -> Self {
        debug_assert!(slowdown_bytes < stop_bytes);
        SwapRateLimiter {
            inflight_bytes: Arc::new(AtomicUsize::new(0)),
            slowdown_bytes,
            stop_bytes,
        }
    }

    pub fn inflight_bytes(&self) -> usize {
        self.inflight_bytes.load(Ordering::Relaxed)
    }

    /// Account a swap's payload for the duration of the returned guard.
    pub fn admit(&self, bytes: usize) -> InflightGuard {
        let inflight = self.inflight_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        crate::metrics::set_inflight_bytes(inflight);
        InflightGuard {
            inflight_bytes: Arc::clone(&self.inflight_bytes),
            bytes,
        }
    }

    pub fn level(&self) -> RateLimitLevel {
        let inflight = self.inflight_bytes();
        if inflight < self.slowdown_bytes {
            RateLimitLevel::None
        } else if inflight < self.stop_bytes {
            RateLimitLevel::Slowdown
        } else {
            RateLimitLevel::Stop
        }
    }

    /// Suggested submission delay for the current level.
    pub fn delay(&self) -> Duration {
        let inflight = self.inflight_bytes();
        if inflight < self.slowdown_bytes {
            return Duration::ZERO;
        }
        if inflight >= self.stop_bytes {
            return DELAY_MAX;
        }
        let span = (self.stop_bytes - self.slowdown_bytes) as f64;
        let overshoot = (inflight - self.slowdown_bytes) as f64;
        DELAY_MIN + (DELAY_MAX - DELAY_MIN).mul_f64(overshoot / span)
    }

    /// Sleep out the suggested delay, if any.
    pub async fn throttle(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "pacing swap submission");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Releases its share of the in-flight accounting on drop.
pub struct InflightGuard {
    inflight_bytes: Arc<AtomicUsize>,
    bytes: usize,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let prev = self.inflight_bytes.fetch_sub(self.bytes, Ordering::Relaxed);
        crate::metrics::set_inflight_bytes(prev.saturating_sub(self.bytes));
    }
}
