// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-key swap metadata: object kind, version, and residency accounting.

pub mod object;
pub mod segments;

pub use object::{ObjectKind, ObjectMeta};
pub use segments::{ListMeta, Segment, SegmentError, SegmentKind, ValidMode, INITIAL_RIDX};
