// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the swap engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `swap_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size histograms
//!
//! # Labels
//! - `intention`: in, out, del, nop
//! - `kind`: string, hash, set, zset, list
//! - `outcome`: swapped, freed, absent, unsupported

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Record one analyzed swap by its decided intention and object kind.
pub fn record_swap(intention: &'static str, kind: &'static str) {
    counter!(
        "swap_engine_swaps_total",
        "intention" => intention,
        "kind" => kind
    )
    .increment(1);
}

/// Record swap execution latency.
pub fn record_swap_latency(intention: &'static str, duration: Duration) {
    histogram!(
        "swap_engine_swap_seconds",
        "intention" => intention
    )
    .record(duration.as_secs_f64());
}

/// Record payload bytes moved by one swap.
pub fn record_swap_bytes(intention: &'static str, bytes: usize) {
    histogram!(
        "swap_engine_swap_bytes",
        "intention" => intention
    )
    .record(bytes as f64);
}

/// Record an eviction attempt outcome.
pub fn record_evict(outcome: &'static str) {
    counter!(
        "swap_engine_evictions_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record keys reclaimed by one expiry scan cycle.
pub fn record_expired(count: usize) {
    counter!("swap_engine_expired_keys_total").increment(count as u64);
}

/// Set the current in-flight swap footprint.
pub fn set_inflight_bytes(bytes: usize) {
    gauge!("swap_engine_inflight_bytes").set(bytes as f64);
}

/// Set the expiry scanner's estimated stale fraction (0.0 - 1.0).
pub fn set_expire_stale_percent(percent: f64) {
    gauge!("swap_engine_expire_stale_percent").set(percent);
}

/// Record entries reclaimed by a compaction filter pass.
pub fn record_compaction_dropped(count: usize) {
    counter!("swap_engine_compaction_dropped_total").increment(count as u64);
}

/// Times a swap from admission to completion; records on drop.
pub struct SwapTimer {
    intention: &'static str,
    start: Instant,
}

impl SwapTimer {
    pub fn new(intention: &'static str) -> Self {
        Self {
            intention,
            start: Instant::now(),
        }
    }
}

impl Drop for SwapTimer {
    fn drop(&mut self) {
        record_swap_latency(self.intention, self.start.elapsed());
    }
}
