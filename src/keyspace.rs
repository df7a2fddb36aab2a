// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The hot tier: one concurrent map of live values per keyspace, plus the
//! metadata that ties each key to its on-disk fragments.
//!
//! Residency contract per key:
//! - hot: entry present, no meta (or a hot meta tracking 0 cold elements)
//! - warm: entry present and meta counts disk-resident elements
//! - cold: meta only, every element on disk
//!
//! Versions are handed out by a per-keyspace counter and never reused;
//! version 0 is reserved for whole-key (string) data so it survives any
//! filter comparison.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::meta::{ObjectKind, ObjectMeta};

/// A live, memory-resident value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    Zset(HashMap<Vec<u8>, f64>),
    List(VecDeque<Vec<u8>>),
}

impl Value {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Value::String(_) => ObjectKind::String,
            Value::Hash(_) => ObjectKind::Hash,
            Value::Set(_) => ObjectKind::Set,
            Value::Zset(_) => ObjectKind::Zset,
            Value::List(_) => ObjectKind::List,
        }
    }

    /// Resident element count (1 for strings).
    pub fn len(&self) -> usize {
        match self {
            Value::String(_) => 1,
            Value::Hash(map) => map.len(),
            Value::Set(set) => set.len(),
            Value::Zset(map) => map.len(),
            Value::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(_) => false,
            _ => self.len() == 0,
        }
    }

    /// Rough payload size, used for eviction step budgets.
    pub fn estimated_bytes(&self) -> usize {
        match self {
            Value::String(raw) => raw.len(),
            Value::Hash(map) => map.iter().map(|(k, v)| k.len() + v.len()).sum(),
            Value::Set(set) => set.iter().map(|m| m.len()).sum(),
            Value::Zset(map) => map.keys().map(|m| m.len() + 8).sum(),
            Value::List(list) => list.iter().map(|e| e.len()).sum(),
        }
    }
}

/// A hot-tier slot: the value plus whether it has unpersisted changes.
/// Clean entries can be dropped on eviction without touching disk.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    pub dirty: bool,
}

impl Entry {
    pub fn dirty(value: Value) -> Self {
        Entry { value, dirty: true }
    }

    pub fn clean(value: Value) -> Self {
        Entry {
            value,
            dirty: false,
        }
    }
}

/// One logical database: hot values, swap metadata, TTLs, and the version
/// counter fencing this keyspace's disk fragments.
pub struct Keyspace {
    id: u32,
    pub(crate) entries: DashMap<Vec<u8>, Entry>,
    pub(crate) metas: DashMap<Vec<u8>, ObjectMeta>,
    pub(crate) expires: DashMap<Vec<u8>, i64>,
    /// Bounded working set for the expiry scanner, ordered by deadline.
    pub(crate) expire_candidates: Mutex<BTreeSet<(i64, Vec<u8>)>>,
    /// Where the next meta-record scan for expiring keys resumes.
    pub(crate) expire_seek: Mutex<Vec<u8>>,
    next_version: AtomicU64,
}

impl Keyspace {
    pub fn new(id: u32) -> Self {
        Keyspace {
            id,
            entries: DashMap::new(),
            metas: DashMap::new(),
            expires: DashMap::new(),
            expire_candidates: Mutex::new(BTreeSet::new()),
            expire_seek: Mutex::new(Vec::new()),
            next_version: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Allocate the next version. Strictly increasing for the life of the
    /// keyspace; starts at 1 because 0 means "whole-key data, never filter".
    pub fn alloc_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Highest version handed out so far.
    pub fn current_version(&self) -> u64 {
        self.next_version.load(Ordering::Relaxed)
    }

    /// Raise the version floor to cover a version seen in a persisted
    /// record, so a restarted keyspace never reissues it.
    pub(crate) fn observe_version(&self, version: u64) {
        self.next_version.fetch_max(version, Ordering::Relaxed);
    }

    pub fn entry(&self, key: &[u8]) -> Option<dashmap::mapref::one::Ref<'_, Vec<u8>, Entry>> {
        self.entries.get(key)
    }

    pub fn meta(&self, key: &[u8]) -> Option<ObjectMeta> {
        self.metas.get(key).map(|m| m.clone())
    }

    pub fn expire_at(&self, key: &[u8]) -> Option<i64> {
        self.expires.get(key).map(|e| *e)
    }

    /// Insert or replace a value as dirty. Replacement of a different kind
    /// drops the old meta; the stale disk fragments are fenced off by the
    /// version bump at the next eviction.
    pub fn put(&self, key: Vec<u8>, value: Value) {
        let kind = value.kind();
        if self
            .metas
            .get(&key)
            .map(|m| m.kind() != kind)
            .unwrap_or(false)
        {
            self.metas.remove(&key);
        }
        self.entries.insert(key, Entry::dirty(value));
    }

    /// Set a TTL and register the key with the expiry scanner, bounded by
    /// `candidates_max`.
    pub fn set_expire(&self, key: &[u8], at_ms: i64, candidates_max: usize) {
        self.expires.insert(key.to_vec(), at_ms);
        self.add_expire_candidate(key, at_ms, candidates_max);
    }

    /// Register a scanner candidate. A full set keeps the earliest deadlines:
    /// a new candidate displaces the latest one when it expires sooner.
    pub(crate) fn add_expire_candidate(&self, key: &[u8], at_ms: i64, candidates_max: usize) {
        if candidates_max == 0 {
            return;
        }
        let mut candidates = self.expire_candidates.lock();
        if candidates.len() >= candidates_max {
            let last = match candidates.iter().next_back() {
                Some(last) if last.0 > at_ms => last.clone(),
                _ => return,
            };
            candidates.remove(&last);
        }
        candidates.insert((at_ms, key.to_vec()));
    }

    pub fn remove_expire(&self, key: &[u8]) {
        if let Some((_, at_ms)) = self.expires.remove(key) {
            self.expire_candidates.lock().remove(&(at_ms, key.to_vec()));
        }
    }

    /// Whether the key exists in either tier.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key) || self.metas.contains_key(key)
    }

    /// Forget every in-memory trace of a key. Disk fragments are the
    /// engine's job.
    pub(crate) fn purge(&self, key: &[u8]) {
        self.entries.remove(key);
        self.metas.remove(key);
        self.remove_expire(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_start_past_reserved_zero() {
        let ks = Keyspace::new(0);
        assert_eq!(ks.current_version(), 0);
        assert_eq!(ks.alloc_version(), 1);
        assert_eq!(ks.alloc_version(), 2);
        assert_eq!(ks.current_version(), 2);
    }

    #[test]
    fn observed_versions_are_never_reissued() {
        let ks = Keyspace::new(0);
        ks.observe_version(7);
        assert_eq!(ks.alloc_version(), 8);
        // An older observation never lowers the floor.
        ks.observe_version(3);
        assert_eq!(ks.alloc_version(), 9);
    }

    #[test]
    fn put_of_new_kind_drops_old_meta() {
        let ks = Keyspace::new(0);
        ks.metas.insert(
            b"k".to_vec(),
            ObjectMeta::new_len(ObjectKind::Hash, 1, 3),
        );
        ks.put(b"k".to_vec(), Value::String(b"v".to_vec()));
        assert!(ks.meta(b"k").is_none());

        ks.metas.insert(
            b"h".to_vec(),
            ObjectMeta::new_len(ObjectKind::Hash, 2, 3),
        );
        ks.put(b"h".to_vec(), Value::Hash(HashMap::new()));
        assert!(ks.meta(b"h").is_some());
    }

    #[test]
    fn expire_candidates_are_bounded() {
        let ks = Keyspace::new(0);
        for i in 0..10i64 {
            ks.set_expire(format!("k{i}").as_bytes(), 1000 + i, 4);
        }
        assert_eq!(ks.expire_candidates.lock().len(), 4);
        assert_eq!(ks.expires.len(), 10);
    }

    #[test]
    fn full_candidate_set_keeps_earliest_deadlines() {
        let ks = Keyspace::new(0);
        for i in 0..4i64 {
            ks.set_expire(format!("k{i}").as_bytes(), 1000 + i, 4);
        }
        // Later than everything tracked: ignored.
        ks.set_expire(b"late", 9000, 4);
        assert!(!ks.expire_candidates.lock().contains(&(9000, b"late".to_vec())));
        // Earlier: displaces the latest deadline.
        ks.set_expire(b"early", 10, 4);
        let candidates = ks.expire_candidates.lock();
        assert_eq!(candidates.len(), 4);
        assert!(candidates.contains(&(10, b"early".to_vec())));
        assert!(!candidates.contains(&(1003, b"k3".to_vec())));
    }

    #[test]
    fn purge_clears_all_tables() {
        let ks = Keyspace::new(0);
        ks.put(b"k".to_vec(), Value::String(b"v".to_vec()));
        ks.set_expire(b"k", 5000, 16);
        ks.purge(b"k");
        assert!(!ks.exists(b"k"));
        assert!(ks.expire_at(b"k").is_none());
        assert!(ks.expire_candidates.lock().is_empty());
    }
}
