// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Swap Engine
//!
//! A tiered-storage swap engine for an in-memory key-value store: values
//! live in memory while hot and spill to a sorted cold store, whole or in
//! parts, as memory pressure demands.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Access Layer                          │
//! │  • Classifies each command's touch (read/write/del/count)   │
//! │  • Decision table turns it into a swap intention            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Hot Tier (memory)                       │
//! │  • DashMap of live values per keyspace                      │
//! │  • ObjectMeta tracks what spilled: counts or list segments  │
//! │  • Per-keyspace version counter fences stale disk data      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 (swap in / swap out / swap del)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Cold Tier (sorted store)                  │
//! │  • Data / Meta / Score column families                      │
//! │  • Order-preserving key codecs enable bounded range scans   │
//! │  • Compaction filter reclaims version-fenced fragments      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swap_engine::{SwapEngine, SwapEngineConfig, Value, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = SwapEngine::new(SwapEngineConfig::default(), Arc::new(MemoryStore::new()));
//!
//!     let ks = engine.keyspace(0);
//!     ks.put(b"greeting".to_vec(), Value::String(b"hello".to_vec()));
//!
//!     // Push the value to the cold tier and read it back.
//!     engine.evict_key(0, b"greeting").await.expect("evict failed");
//!     let value = engine.read(0, b"greeting").await.expect("read failed");
//!     assert_eq!(value, Some(Value::String(b"hello".to_vec())));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: Swap analysis and execution
//! - [`keyspace`]: The hot tier
//! - [`meta`]: Object metadata and list segment algebra
//! - [`codec`]: Cold-tier key and value formats
//! - [`storage`]: Cold-tier seam, in-memory backend, compaction filter
//! - [`expire`]: Adaptive expiry scan sizing
//! - [`ratelimit`]: Advisory pacing of swap traffic

pub mod codec;
pub mod config;
pub mod engine;
pub mod expire;
pub mod keyspace;
pub mod meta;
pub mod metrics;
pub mod ratelimit;
pub mod storage;

pub use config::SwapEngineConfig;
pub use engine::{
    analyze, AccessMode, EvictOutcome, ExecFlags, KeyState, SwapEngine, SwapError,
    SwapIntention, SwapPlan,
};
pub use expire::ExpiryScanner;
pub use keyspace::{Entry, Keyspace, Value};
pub use meta::{ListMeta, ObjectKind, ObjectMeta, Segment, SegmentKind, INITIAL_RIDX};
pub use ratelimit::{RateLimitLevel, SwapRateLimiter};
pub use storage::{
    filter_decision, BatchOp, Cf, ColdStore, FilterDecision, MemoryStore, StorageError,
    WriteBatch,
};
