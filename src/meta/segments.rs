// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Interval bookkeeping for partially resident lists.
//!
//! A [`ListMeta`] records, for one list key, which logical index ranges are
//! memory-resident (hot) and which exist only on disk (cold). Indices are
//! "ridx": the logical position shifted by [`INITIAL_RIDX`] so that head
//! pushes can extend downward without going negative for the life of the key.
//!
//! Two validity regimes exist. Strict metas describe real list structure:
//! ordered, non-empty, exactly adjacent segments whose lengths sum to the
//! total. Range metas describe ephemeral requests: ordered and
//! non-overlapping, but gaps are fine.
//!
//! None of this is thread-safe; callers hold the per-key request lock.

use thiserror::Error;

/// Ridx of logical index 0 for a fresh list.
pub const INITIAL_RIDX: i64 = i64::MAX >> 1;

/// Segment array growth: double while small, then grow linearly.
const CAPACITY_DEFAULT: usize = 4;
const CAPACITY_LINEAR: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Hot,
    Cold,
}

impl SegmentKind {
    pub fn flip(self) -> Self {
        match self {
            SegmentKind::Hot => SegmentKind::Cold,
            SegmentKind::Cold => SegmentKind::Hot,
        }
    }
}

/// A contiguous run of list indices sharing one residency kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: i64,
    pub len: i64,
}

impl Segment {
    pub fn new(kind: SegmentKind, start: i64, len: i64) -> Self {
        Segment { kind, start, len }
    }

    #[inline]
    pub fn end(&self) -> i64 {
        self.start + self.len
    }

    #[inline]
    pub fn contains(&self, ridx: i64) -> bool {
        self.start <= ridx && ridx < self.end()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    #[error("segment has non-positive length {0}")]
    EmptySegment(i64),
    #[error("segment starting at {0} overlaps previous segment")]
    Overlap(i64),
    #[error("index {0} outside tracked range")]
    OutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidMode {
    /// Real list structure: non-empty, exactly adjacent segments.
    Strict,
    /// Ephemeral request ranges: ordered and non-overlapping, gaps allowed.
    Ranges,
}

/// Ordered hot/cold segments covering one list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListMeta {
    total: i64,
    segments: Vec<Segment>,
}

impl ListMeta {
    pub fn new() -> Self {
        ListMeta {
            total: 0,
            segments: Vec::with_capacity(CAPACITY_DEFAULT),
        }
    }

    /// Build a strict meta from one segment covering the whole list.
    pub fn whole(kind: SegmentKind, start: i64, len: i64) -> Self {
        let mut m = ListMeta::new();
        if len > 0 {
            m.segments.push(Segment::new(kind, start, len));
            m.total = len;
        }
        m
    }

    /// Normalize command ranges (inclusive ends, negatives count from the
    /// tail) into a range meta in ridx space. `None` if any range is
    /// entirely out of bounds.
    pub fn from_request(ridx_shift: i64, ranges: &[(i64, i64)], list_len: i64) -> Option<Self> {
        let mut m = ListMeta::new();
        for &(start, end) in ranges {
            let mut start = if start < 0 { start + list_len } else { start };
            let mut end = if end < 0 { end + list_len } else { end };
            if start < 0 {
                start = 0;
            }
            if start > end || start >= list_len {
                return None;
            }
            if end >= list_len {
                end = list_len - 1;
            }
            m.segments.push(Segment::new(
                SegmentKind::Hot,
                start + ridx_shift,
                end - start + 1,
            ));
            m.total += end - start + 1;
        }
        Some(m)
    }

    #[inline]
    pub fn total(&self) -> i64 {
        self.total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Ridx of the first tracked index, or [`INITIAL_RIDX`] when empty.
    pub fn ridx_shift(&self) -> i64 {
        self.first().map_or(INITIAL_RIDX, |s| s.start)
    }

    /// Total indices of the given kind.
    pub fn len_of(&self, kind: SegmentKind) -> i64 {
        self.segments
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.len)
            .sum()
    }

    pub fn hot_len(&self) -> i64 {
        self.len_of(SegmentKind::Hot)
    }

    pub fn cold_len(&self) -> i64 {
        self.len_of(SegmentKind::Cold)
    }

    /// Translate a ridx into an index within the in-memory (hot) list.
    /// `None` if the ridx falls in a cold segment or outside the meta.
    pub fn hot_index_of(&self, ridx: i64) -> Option<i64> {
        let mut hot_before = 0;
        for seg in &self.segments {
            if seg.contains(ridx) {
                return match seg.kind {
                    SegmentKind::Hot => Some(hot_before + (ridx - seg.start)),
                    SegmentKind::Cold => None,
                };
            }
            if seg.kind == SegmentKind::Hot {
                hot_before += seg.len;
            }
        }
        None
    }

    /// Logical (unshifted, 0-based) list index of a ridx.
    pub fn list_index_of(&self, ridx: i64) -> Option<i64> {
        let shift = self.ridx_shift();
        if ridx < shift || ridx >= shift + self.total {
            None
        } else {
            Some(ridx - shift)
        }
    }

    pub fn is_valid(&self, mode: ValidMode) -> bool {
        let mut sum = 0;
        let mut prev_end: Option<i64> = None;
        for seg in &self.segments {
            if seg.len < 0 || (seg.len == 0 && mode == ValidMode::Strict) {
                return false;
            }
            if let Some(end) = prev_end {
                match mode {
                    ValidMode::Strict => {
                        if seg.start != end {
                            return false;
                        }
                    }
                    ValidMode::Ranges => {
                        if seg.start < end {
                            return false;
                        }
                    }
                }
            }
            prev_end = Some(seg.end());
            sum += seg.len;
        }
        sum == self.total
    }

    /// Grow the backing array to hold `extra` more segments: double while
    /// small, then grow linearly to keep wide lists from thrashing the
    /// allocator.
    fn make_room(&mut self, extra: usize) {
        let need = self.segments.len() + extra;
        let mut cap = self.segments.capacity().max(CAPACITY_DEFAULT);
        while cap < need {
            if cap >= CAPACITY_LINEAR {
                cap += CAPACITY_LINEAR;
            } else {
                cap *= 2;
            }
        }
        if cap > self.segments.capacity() {
            self.segments.reserve_exact(cap - self.segments.len());
        }
    }

    /// Append a segment, merging into the last one when it is contiguous and
    /// the same kind. Rejects overlap with the tracked tail.
    pub fn append(&mut self, kind: SegmentKind, start: i64, len: i64) -> Result<(), SegmentError> {
        if len <= 0 {
            return Err(SegmentError::EmptySegment(len));
        }
        if let Some(last) = self.segments.last() {
            if start < last.end() {
                return Err(SegmentError::Overlap(start));
            }
        }
        self.append_unchecked(kind, start, len);
        Ok(())
    }

    /// Like [`append`](Self::append), for callers that already know the
    /// segment is in order (swap range construction appends out of order and
    /// sorts afterwards).
    fn append_unchecked(&mut self, kind: SegmentKind, start: i64, len: i64) {
        if len <= 0 {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if last.kind == kind && last.end() == start {
                last.len += len;
                self.total += len;
                return;
            }
        }
        self.make_room(1);
        self.segments.push(Segment::new(kind, start, len));
        self.total += len;
    }

    /// Merge adjacent same-kind segments and drop empty ones, in one pass.
    pub fn defrag(&mut self) {
        let mut out: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for seg in self.segments.drain(..) {
            if seg.len == 0 {
                continue;
            }
            match out.last_mut() {
                Some(last) if last.kind == seg.kind && last.end() == seg.start => {
                    last.len += seg.len;
                }
                _ => out.push(seg),
            }
        }
        self.segments = out;
    }

    /// Half-open range `[lo, hi)` of segment positions overlapping `query`,
    /// found with two binary searches.
    pub fn search_overlaps(&self, query: &Segment) -> (usize, usize) {
        // First segment whose end is past the query start.
        let lo = self.segments.partition_point(|s| s.end() <= query.start);
        // First segment starting at or past the query end.
        let hi = self.segments.partition_point(|s| s.start < query.end());
        (lo, hi.max(lo))
    }

    /// Intersect the cold portions of `self` with the requested ranges,
    /// widening each by `padding` indices on both sides (clamped to the
    /// containing segment) so nearby elements ride along on the same load.
    /// The result is a range meta of hot segments to fetch from disk.
    pub fn swap_in_ranges(&self, request: &ListMeta, padding: i64) -> ListMeta {
        debug_assert!(self.is_valid(ValidMode::Strict));
        debug_assert!(request.is_valid(ValidMode::Ranges));
        let mut out = ListMeta::new();
        for want in &request.segments {
            let (lo, hi) = self.search_overlaps(want);
            for seg in &self.segments[lo..hi] {
                if seg.kind != SegmentKind::Cold {
                    continue;
                }
                let start = (want.start - padding).max(seg.start);
                let end = (want.end() + padding).min(seg.end());
                if start < end {
                    out.append_unchecked(SegmentKind::Hot, start, end - start);
                }
            }
        }
        out.segments.sort_by_key(|s| s.start);
        out.defrag();
        out
    }

    /// Pick up to `max_elements` hot indices to move to disk, preferring the
    /// middle of the list so that head and tail stay resident for pushes and
    /// pops. Walks segments outward from the center, alternating sides
    /// toward whichever has more segments left, then re-orders the picks.
    pub fn swap_out_ranges(&self, max_elements: i64) -> ListMeta {
        debug_assert!(self.is_valid(ValidMode::Strict));
        let mut out = ListMeta::new();
        let num = self.segments.len() as i64;
        if num == 0 || max_elements <= 0 {
            return out;
        }
        let mut budget = max_elements;
        let mut l = (num - 1) / 2;
        let mut r = l + 1;
        while budget > 0 && (l >= 0 || r < num) {
            let from_left = if l < 0 {
                false
            } else if r >= num {
                true
            } else {
                // Favor the side with more segments remaining.
                l + 1 > num - r
            };
            let seg = if from_left {
                let s = self.segments[l as usize];
                l -= 1;
                s
            } else {
                let s = self.segments[r as usize];
                r += 1;
                s
            };
            if seg.kind != SegmentKind::Hot {
                continue;
            }
            let take = seg.len.min(budget);
            // Take from the inner edge of the segment.
            let start = if from_left { seg.end() - take } else { seg.start };
            out.append_unchecked(SegmentKind::Cold, start, take);
            budget -= take;
        }
        out.segments.sort_by_key(|s| s.start);
        out.defrag();
        out
    }

    /// Expand a range meta of hot picks into a strict meta spanning `self`:
    /// gaps before, between and after the picks are filled with cold
    /// segments. Used after eviction to rebuild full list structure.
    pub fn align(&self, delta: &ListMeta) -> ListMeta {
        debug_assert!(self.is_valid(ValidMode::Strict));
        debug_assert!(delta.is_valid(ValidMode::Ranges));
        let span_start = self.ridx_shift();
        let span_end = span_start + self.total;
        let mut out = ListMeta::new();
        let mut cursor = span_start;
        for seg in &delta.segments {
            debug_assert!(seg.start >= cursor && seg.end() <= span_end);
            if seg.start > cursor {
                out.append_unchecked(SegmentKind::Cold, cursor, seg.start - cursor);
            }
            out.append_unchecked(seg.kind, seg.start, seg.len);
            cursor = seg.end();
        }
        if cursor < span_end {
            out.append_unchecked(SegmentKind::Cold, cursor, span_end - cursor);
        }
        debug_assert!(out.is_valid(ValidMode::Strict));
        out
    }

    /// Flip the residency of one index. Returns `Ok(false)` if the index
    /// already had that kind. Splits the containing segment as needed and
    /// merges into matching neighbors so the meta stays strict.
    pub fn update(&mut self, ridx: i64, kind: SegmentKind) -> Result<bool, SegmentError> {
        debug_assert!(self.is_valid(ValidMode::Strict));
        let i = self.segments.partition_point(|s| s.end() <= ridx);
        if i == self.segments.len() || !self.segments[i].contains(ridx) {
            return Err(SegmentError::OutOfRange(ridx));
        }
        let seg = self.segments[i];
        if seg.kind == kind {
            return Ok(false);
        }
        let at_start = seg.start == ridx;
        let at_end = seg.end() - 1 == ridx;
        match (at_start, at_end) {
            (true, true) => {
                // Whole segment flips; fold into matching neighbors.
                let merge_left = i > 0 && self.segments[i - 1].kind == kind;
                let merge_right =
                    i + 1 < self.segments.len() && self.segments[i + 1].kind == kind;
                match (merge_left, merge_right) {
                    (true, true) => {
                        let right_len = self.segments[i + 1].len;
                        self.segments[i - 1].len += 1 + right_len;
                        self.segments.drain(i..=i + 1);
                    }
                    (true, false) => {
                        self.segments[i - 1].len += 1;
                        self.segments.remove(i);
                    }
                    (false, true) => {
                        self.segments[i + 1].start -= 1;
                        self.segments[i + 1].len += 1;
                        self.segments.remove(i);
                    }
                    (false, false) => self.segments[i].kind = kind,
                }
            }
            (true, false) => {
                self.segments[i].start += 1;
                self.segments[i].len -= 1;
                if i > 0 && self.segments[i - 1].kind == kind {
                    self.segments[i - 1].len += 1;
                } else {
                    self.make_room(1);
                    self.segments.insert(i, Segment::new(kind, ridx, 1));
                }
            }
            (false, true) => {
                self.segments[i].len -= 1;
                if i + 1 < self.segments.len() && self.segments[i + 1].kind == kind {
                    self.segments[i + 1].start -= 1;
                    self.segments[i + 1].len += 1;
                } else {
                    self.make_room(1);
                    self.segments.insert(i + 1, Segment::new(kind, ridx, 1));
                }
            }
            (false, false) => {
                let tail_len = seg.end() - ridx - 1;
                self.segments[i].len = ridx - seg.start;
                self.make_room(2);
                self.segments.insert(i + 1, Segment::new(kind, ridx, 1));
                self.segments
                    .insert(i + 2, Segment::new(seg.kind, ridx + 1, tail_len));
            }
        }
        debug_assert!(self.is_valid(ValidMode::Strict));
        Ok(true)
    }

    /// Grow (`delta > 0`) or shrink (`delta < 0`) the tracked range at the
    /// head. Growth always adds hot indices (new pushes are resident).
    pub fn extend_head(&mut self, delta: i64) {
        if delta > 0 {
            let start = self.ridx_shift() - delta;
            match self.segments.first_mut() {
                Some(first) if first.kind == SegmentKind::Hot => {
                    first.start = start;
                    first.len += delta;
                }
                _ => {
                    self.make_room(1);
                    self.segments
                        .insert(0, Segment::new(SegmentKind::Hot, start, delta));
                }
            }
            self.total += delta;
        } else {
            let mut remain = -delta;
            while remain > 0 {
                let first = &mut self.segments[0];
                let cut = first.len.min(remain);
                first.start += cut;
                first.len -= cut;
                remain -= cut;
                self.total -= cut;
                if first.len == 0 {
                    self.segments.remove(0);
                }
            }
        }
    }

    /// Same as [`extend_head`](Self::extend_head), at the tail.
    pub fn extend_tail(&mut self, delta: i64) {
        if delta > 0 {
            let start = self.ridx_shift() + self.total;
            match self.segments.last_mut() {
                Some(last) if last.kind == SegmentKind::Hot => last.len += delta,
                _ => {
                    self.make_room(1);
                    self.segments
                        .push(Segment::new(SegmentKind::Hot, start, delta));
                }
            }
            self.total += delta;
        } else {
            let mut remain = -delta;
            while remain > 0 {
                let idx = self.segments.len() - 1;
                let last = &mut self.segments[idx];
                let cut = last.len.min(remain);
                last.len -= cut;
                remain -= cut;
                self.total -= cut;
                if last.len == 0 {
                    self.segments.pop();
                }
            }
        }
    }

    /// Iterate every tracked ridx with its kind, optionally filtered.
    pub fn indices(
        &self,
        filter: Option<SegmentKind>,
    ) -> impl Iterator<Item = (i64, SegmentKind)> + '_ {
        self.segments
            .iter()
            .filter(move |s| filter.map_or(true, |k| s.kind == k))
            .flat_map(|s| (s.start..s.end()).map(move |ridx| (ridx, s.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(segs: &[(SegmentKind, i64, i64)]) -> ListMeta {
        let mut m = ListMeta::new();
        for &(kind, start, len) in segs {
            m.append(kind, start, len).unwrap();
        }
        m
    }

    fn segs(m: &ListMeta) -> Vec<(SegmentKind, i64, i64)> {
        m.segments().iter().map(|s| (s.kind, s.start, s.len)).collect()
    }

    use SegmentKind::{Cold, Hot};

    #[test]
    fn append_merges_contiguous_same_kind() {
        let mut m = ListMeta::new();
        m.append(Hot, 0, 5).unwrap();
        m.append(Hot, 5, 3).unwrap();
        assert_eq!(segs(&m), vec![(Hot, 0, 8)]);
        m.append(Cold, 8, 2).unwrap();
        assert_eq!(m.num_segments(), 2);
        assert_eq!(m.total(), 10);
    }

    #[test]
    fn append_rejects_overlap_and_empty() {
        let mut m = meta(&[(Hot, 0, 5)]);
        assert_eq!(m.append(Cold, 4, 2), Err(SegmentError::Overlap(4)));
        assert_eq!(m.append(Cold, 5, 0), Err(SegmentError::EmptySegment(0)));
    }

    #[test]
    fn validity_modes() {
        let strict = meta(&[(Hot, 0, 5), (Cold, 5, 5)]);
        assert!(strict.is_valid(ValidMode::Strict));
        assert!(strict.is_valid(ValidMode::Ranges));

        let mut gappy = ListMeta::new();
        gappy.append(Hot, 0, 3).unwrap();
        gappy.append(Hot, 10, 3).unwrap();
        assert!(!gappy.is_valid(ValidMode::Strict));
        assert!(gappy.is_valid(ValidMode::Ranges));
    }

    #[test]
    fn search_overlaps_half_open() {
        let m = meta(&[(Hot, 0, 10), (Cold, 10, 10), (Hot, 20, 10)]);
        assert_eq!(m.search_overlaps(&Segment::new(Hot, 5, 10)), (0, 2));
        assert_eq!(m.search_overlaps(&Segment::new(Hot, 10, 10)), (1, 2));
        assert_eq!(m.search_overlaps(&Segment::new(Hot, 29, 1)), (2, 3));
        assert_eq!(m.search_overlaps(&Segment::new(Hot, 30, 5)), (3, 3));
    }

    #[test]
    fn swap_in_intersects_cold_only() {
        // [hot 0..10)[cold 10..20)[hot 20..30)
        let m = meta(&[(Hot, 0, 10), (Cold, 10, 10), (Hot, 20, 10)]);
        let req = ListMeta::from_request(0, &[(5, 24)], 30).unwrap();
        let got = m.swap_in_ranges(&req, 0);
        assert_eq!(segs(&got), vec![(Hot, 10, 10)]);
    }

    #[test]
    fn swap_in_padding_clamps_to_segment() {
        let m = meta(&[(Hot, 0, 10), (Cold, 10, 20), (Hot, 30, 10)]);
        let req = ListMeta::from_request(0, &[(14, 15)], 40).unwrap();
        let got = m.swap_in_ranges(&req, 3);
        assert_eq!(segs(&got), vec![(Hot, 11, 8)]);
        // Padding past the segment edge is clamped.
        let req = ListMeta::from_request(0, &[(10, 11)], 40).unwrap();
        let got = m.swap_in_ranges(&req, 5);
        assert_eq!(segs(&got), vec![(Hot, 10, 7)]);
    }

    #[test]
    fn swap_in_nothing_when_all_hot() {
        let m = meta(&[(Hot, 0, 30)]);
        let req = ListMeta::from_request(0, &[(0, -1)], 30).unwrap();
        assert!(m.swap_in_ranges(&req, 0).is_empty());
    }

    #[test]
    fn swap_out_prefers_middle() {
        // Scenario: fully hot list split across three segments after updates.
        let m = meta(&[(Hot, 0, 10), (Cold, 10, 5), (Hot, 15, 10)]);
        let got = m.swap_out_ranges(6);
        // Middle segment is cold; picks spill to the sides' inner edges.
        assert!(got.is_valid(ValidMode::Ranges));
        assert_eq!(got.total(), 6);
        for seg in got.segments() {
            assert_eq!(seg.kind, Cold);
            // Nothing picked from the already-cold middle.
            assert!(seg.end() <= 10 || seg.start >= 15);
        }
        // Head and tail extremes stay resident.
        assert!(got.segments().iter().all(|s| s.start > 0 && s.end() < 25));
    }

    #[test]
    fn swap_out_budget_respected() {
        let m = meta(&[(Hot, 0, 100)]);
        let got = m.swap_out_ranges(10);
        assert_eq!(got.total(), 10);
        let got = m.swap_out_ranges(1000);
        assert_eq!(got.total(), 100);
    }

    #[test]
    fn align_fills_gaps_with_cold() {
        let m = meta(&[(Hot, 0, 30)]);
        let mut delta = ListMeta::new();
        delta.append(Hot, 5, 5).unwrap();
        delta.append(Hot, 20, 5).unwrap();
        let aligned = m.align(&delta);
        assert_eq!(
            segs(&aligned),
            vec![
                (Cold, 0, 5),
                (Hot, 5, 5),
                (Cold, 10, 10),
                (Hot, 20, 5),
                (Cold, 25, 5)
            ]
        );
        assert!(aligned.is_valid(ValidMode::Strict));
        assert_eq!(aligned.total(), 30);
    }

    #[test]
    fn update_point_flip_middle_splits_three() {
        let mut m = meta(&[(Hot, 0, 10)]);
        assert!(m.update(4, Cold).unwrap());
        assert_eq!(segs(&m), vec![(Hot, 0, 4), (Cold, 4, 1), (Hot, 5, 5)]);
        assert_eq!(m.total(), 10);
    }

    #[test]
    fn update_merges_into_left_neighbor() {
        let mut m = meta(&[(Cold, 0, 4), (Hot, 4, 6)]);
        assert!(m.update(4, Cold).unwrap());
        assert_eq!(segs(&m), vec![(Cold, 0, 5), (Hot, 5, 5)]);
    }

    #[test]
    fn update_merges_into_right_neighbor() {
        let mut m = meta(&[(Hot, 0, 4), (Cold, 4, 6)]);
        assert!(m.update(3, Cold).unwrap());
        assert_eq!(segs(&m), vec![(Hot, 0, 3), (Cold, 3, 7)]);
    }

    #[test]
    fn update_singleton_collapses_both_neighbors() {
        let mut m = meta(&[(Hot, 0, 4), (Cold, 4, 1), (Hot, 5, 5)]);
        assert!(m.update(4, Hot).unwrap());
        assert_eq!(segs(&m), vec![(Hot, 0, 10)]);
    }

    #[test]
    fn update_noop_and_out_of_range() {
        let mut m = meta(&[(Hot, 0, 10)]);
        assert!(!m.update(4, Hot).unwrap());
        assert_eq!(m.update(10, Cold), Err(SegmentError::OutOfRange(10)));
        assert_eq!(m.update(-1, Cold), Err(SegmentError::OutOfRange(-1)));
    }

    #[test]
    fn update_total_invariant_under_random_flips() {
        let mut m = meta(&[(Hot, 0, 64)]);
        // Deterministic pseudo-random walk.
        let mut x: u64 = 0x9e3779b97f4a7c15;
        for _ in 0..500 {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let ridx = (x >> 33) as i64 % 64;
            let kind = if x & 1 == 0 { Hot } else { Cold };
            m.update(ridx, kind).unwrap();
            assert!(m.is_valid(ValidMode::Strict));
            assert_eq!(m.total(), 64);
        }
    }

    #[test]
    fn extend_head_and_tail() {
        let mut m = meta(&[(Cold, 100, 10)]);
        m.extend_head(3);
        assert_eq!(segs(&m), vec![(Hot, 97, 3), (Cold, 100, 10)]);
        m.extend_tail(2);
        assert_eq!(
            segs(&m),
            vec![(Hot, 97, 3), (Cold, 100, 10), (Hot, 110, 2)]
        );
        m.extend_head(-4);
        assert_eq!(segs(&m), vec![(Cold, 101, 9), (Hot, 110, 2)]);
        m.extend_tail(-2);
        assert_eq!(segs(&m), vec![(Cold, 101, 9)]);
        assert_eq!(m.total(), 9);
    }

    #[test]
    fn extend_head_merges_hot_runs() {
        let mut m = meta(&[(Hot, 50, 5)]);
        m.extend_head(5);
        assert_eq!(segs(&m), vec![(Hot, 45, 10)]);
    }

    #[test]
    fn from_request_normalizes_negatives() {
        let shift = INITIAL_RIDX;
        let m = ListMeta::from_request(shift, &[(0, -1)], 10).unwrap();
        assert_eq!(segs(&m), vec![(Hot, shift, 10)]);
        let m = ListMeta::from_request(shift, &[(-3, -1)], 10).unwrap();
        assert_eq!(segs(&m), vec![(Hot, shift + 7, 3)]);
        assert!(ListMeta::from_request(shift, &[(5, 3)], 10).is_none());
        assert!(ListMeta::from_request(shift, &[(12, 20)], 10).is_none());
    }

    #[test]
    fn hot_index_translation() {
        let m = meta(&[(Cold, 0, 10), (Hot, 10, 5), (Cold, 15, 5), (Hot, 20, 5)]);
        assert_eq!(m.hot_index_of(10), Some(0));
        assert_eq!(m.hot_index_of(14), Some(4));
        assert_eq!(m.hot_index_of(20), Some(5));
        assert_eq!(m.hot_index_of(5), None);
        assert_eq!(m.hot_index_of(99), None);
        assert_eq!(m.list_index_of(14), Some(14));
        assert_eq!(m.list_index_of(-1), None);
    }

    #[test]
    fn defrag_collapses_adjacent_same_kind() {
        let mut m = ListMeta::new();
        m.segments.push(Segment::new(Hot, 0, 3));
        m.segments.push(Segment::new(Hot, 3, 0));
        m.segments.push(Segment::new(Hot, 3, 4));
        m.segments.push(Segment::new(Cold, 7, 3));
        m.total = 10;
        m.defrag();
        assert_eq!(segs(&m), vec![(Hot, 0, 7), (Cold, 7, 3)]);
    }
}
