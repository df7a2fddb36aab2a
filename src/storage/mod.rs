// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The cold tier: a column-family keyed byte store plus the compaction-time
//! version filter that reclaims fenced-off fragments.

pub mod filter;
pub mod memory;
pub mod traits;

pub use filter::{filter_decision, FilterDecision};
pub use memory::MemoryStore;
pub use traits::{BatchOp, Cf, ColdStore, StorageError, WriteBatch};
