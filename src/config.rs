// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the swap engine.
//!
//! # Example
//!
//! ```
//! use swap_engine::SwapEngineConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SwapEngineConfig::default();
//! assert_eq!(config.evict_step_max_subkeys, 512);
//!
//! // Full config
//! let config = SwapEngineConfig {
//!     swap_in_padding: 32,
//!     evict_step_max_bytes: 512 * 1024,
//!     inflight_slowdown_bytes: 64 * 1024 * 1024,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the swap engine.
///
/// All fields have sensible defaults; the thresholds that matter most in
/// production are the eviction step limits and the in-flight rate-limit
/// watermarks.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapEngineConfig {
    /// Extra elements loaded on each side of a requested list range, so a
    /// sequential reader does not pay one disk round-trip per range.
    /// 0 loads exactly what was asked for.
    #[serde(default = "default_swap_in_padding")]
    pub swap_in_padding: i64,

    /// Max subkeys moved to disk per eviction step for big collections.
    #[serde(default = "default_evict_step_max_subkeys")]
    pub evict_step_max_subkeys: usize,

    /// Max payload bytes moved to disk per eviction step.
    #[serde(default = "default_evict_step_max_bytes")]
    pub evict_step_max_bytes: usize,

    /// In-flight swap memory above which submissions are delayed.
    #[serde(default = "default_inflight_slowdown_bytes")]
    pub inflight_slowdown_bytes: usize,

    /// In-flight swap memory above which the delay saturates.
    #[serde(default = "default_inflight_stop_bytes")]
    pub inflight_stop_bytes: usize,

    /// Upper bound on tracked expiry candidates per keyspace.
    #[serde(default = "default_expire_candidates_max")]
    pub expire_candidates_max: usize,

    /// Keys examined per expiry scan cycle before adaptation.
    #[serde(default = "default_expire_scan_limit")]
    pub expire_scan_limit: usize,

    /// Wall-clock budget for one expiry cycle, in milliseconds. The drain
    /// stops at the first deletion past the deadline, so a burst of large
    /// cold keys cannot stall the tick.
    #[serde(default = "default_expire_cycle_time_ms")]
    pub expire_cycle_time_ms: u64,

    /// Rough per-element byte cost used to convert the byte budget into an
    /// element budget when evicting list middles.
    #[serde(default = "default_list_element_size_estimate")]
    pub list_element_size_estimate: usize,
}

fn default_swap_in_padding() -> i64 {
    0
}

fn default_evict_step_max_subkeys() -> usize {
    512
}

fn default_evict_step_max_bytes() -> usize {
    1024 * 1024 // 1 MB
}

fn default_inflight_slowdown_bytes() -> usize {
    128 * 1024 * 1024 // 128 MB
}

fn default_inflight_stop_bytes() -> usize {
    256 * 1024 * 1024 // 256 MB
}

fn default_expire_candidates_max() -> usize {
    16 * 1024
}

fn default_expire_scan_limit() -> usize {
    32
}

fn default_expire_cycle_time_ms() -> u64 {
    25
}

fn default_list_element_size_estimate() -> usize {
    64
}

impl Default for SwapEngineConfig {
    fn default() -> Self {
        Self {
            swap_in_padding: default_swap_in_padding(),
            evict_step_max_subkeys: default_evict_step_max_subkeys(),
            evict_step_max_bytes: default_evict_step_max_bytes(),
            inflight_slowdown_bytes: default_inflight_slowdown_bytes(),
            inflight_stop_bytes: default_inflight_stop_bytes(),
            expire_candidates_max: default_expire_candidates_max(),
            expire_scan_limit: default_expire_scan_limit(),
            expire_cycle_time_ms: default_expire_cycle_time_ms(),
            list_element_size_estimate: default_list_element_size_estimate(),
        }
    }
}
