// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Adaptive sizing for the expiry scan.
//!
//! The engine keeps a bounded, deadline-ordered candidate set per keyspace
//! and sweeps it periodically. Candidates are advisory: a key's TTL may
//! have been pushed back or removed since it was registered, so some share
//! of each sweep is stale work. The scanner tracks that share with an EMA
//! and sizes the next sweep accordingly: mostly-stale sweeps shrink toward
//! the base limit, productive sweeps grow it so backlogs drain fast.

/// Smoothing factor: 95% history, 5% latest observation.
const EMA_ALPHA: f64 = 0.05;

/// How far past the base limit a fully productive scanner may grow.
const MAX_GROWTH: usize = 8;

#[derive(Debug)]
pub struct ExpiryScanner {
    base_limit: usize,
    stale_ema: f64,
}

impl ExpiryScanner {
    pub fn new(base_limit: usize) -> Self {
        ExpiryScanner {
            base_limit: base_limit.max(1),
            stale_ema: 0.0,
        }
    }

    /// Candidates to examine in the next sweep.
    pub fn next_limit(&self) -> usize {
        let productive = 1.0 - self.stale_ema;
        let growth = 1.0 + (MAX_GROWTH - 1) as f64 * productive;
        (self.base_limit as f64 * growth) as usize
    }

    /// Fold one sweep's result into the estimate. A sweep that examined
    /// nothing carries no signal.
    pub fn observe(&mut self, scanned: usize, expired: usize) {
        if scanned == 0 {
            return;
        }
        let stale = (scanned - expired.min(scanned)) as f64 / scanned as f64;
        self.stale_ema = (1.0 - EMA_ALPHA) * self.stale_ema + EMA_ALPHA * stale;
    }

    /// Estimated fraction of candidates that no longer expire (0.0 - 1.0).
    pub fn stale_percent(&self) -> f64 {
        self.stale_ema
    }
}
