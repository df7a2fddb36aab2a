// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The swap engine: decides and executes data movement between the hot
//! and cold tiers.
//!
//! Every command against a swappable key goes through the same pipeline:
//! classify the access ([`analyze`]), execute the resulting intention
//! (load, evict, or delete disk state), then let the caller run against
//! pure memory. The engine owns the keyspaces, the cold store handle, and
//! the pacing of in-flight swap traffic.

pub mod access;
pub mod analyze;
pub mod evict;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::codec::{
    decode_meta_key, decode_meta_value, CodecError, NO_EXPIRE,
};
use crate::config::SwapEngineConfig;
use crate::expire::ExpiryScanner;
use crate::keyspace::Keyspace;
use crate::meta::{ListMeta, ObjectKind, ObjectMeta, SegmentError};
use crate::ratelimit::SwapRateLimiter;
use crate::storage::{Cf, ColdStore, StorageError};

pub use analyze::{analyze, KeyState};
pub use evict::EvictOutcome;

use parking_lot::Mutex;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error("operation needs a {expected:?}, key holds a {found:?}")]
    WrongKind {
        expected: ObjectKind,
        found: ObjectKind,
    },
    #[error("inconsistent swap state: {0}")]
    Inconsistent(&'static str),
}

/// What a swap does, decided per access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapIntention {
    /// No tier movement needed.
    Nop,
    /// Load fragments from the cold tier.
    In,
    /// Move resident data to the cold tier.
    Out,
    /// Remove the key's cold-tier footprint.
    Del,
}

impl SwapIntention {
    pub(crate) fn label(self) -> &'static str {
        match self {
            SwapIntention::Nop => "nop",
            SwapIntention::In => "in",
            SwapIntention::Out => "out",
            SwapIntention::Del => "del",
        }
    }
}

/// Execution modifiers attached to an intention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecFlags {
    /// Loaded fragments are deleted from the cold tier in the same batch,
    /// making memory the only holder. Always set for list loads and for
    /// loads that precede writes.
    pub exec_in_del: bool,
    /// Delete the meta record but leave data keys for the compaction
    /// filter to reclaim.
    pub skip_data_delete: bool,
    /// The value backing the command is synthesized or transient: an
    /// empty placeholder standing in for a cold collection's count, or a
    /// consumed load that passes through the hot tier only until the
    /// command completes and purges it.
    pub mock_value: bool,
    /// Only the meta record is consulted; no data movement.
    pub meta_only: bool,
}

/// How a command is about to touch a key.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessMode {
    /// Read the whole value.
    Read,
    /// Read specific collection members.
    ReadFields(Vec<Vec<u8>>),
    /// Read list index ranges (inclusive ends, negatives from the tail).
    ReadRange(Vec<(i64, i64)>),
    /// Element count only.
    Cardinality,
    /// Consume the value: read it out and delete the key.
    ReadThenDelete,
    /// Mutate the whole value or specific members.
    Write(Option<Vec<Vec<u8>>>),
    /// Remove the key.
    Delete,
}

/// The analyzed movement for one access.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapPlan {
    pub intention: SwapIntention,
    pub flags: ExecFlags,
    /// For subkey loads: which members to fetch. `None` means everything.
    pub subkeys: Option<Vec<Vec<u8>>>,
    /// For list loads: the cold ranges to fetch, already padded.
    pub ranges: Option<ListMeta>,
}

impl SwapPlan {
    pub fn nop() -> Self {
        SwapPlan {
            intention: SwapIntention::Nop,
            flags: ExecFlags::default(),
            subkeys: None,
            ranges: None,
        }
    }
}

/// Tiered-storage engine over one cold store and any number of keyspaces.
pub struct SwapEngine {
    config: SwapEngineConfig,
    store: Arc<dyn ColdStore>,
    keyspaces: DashMap<u32, Arc<Keyspace>>,
    limiter: SwapRateLimiter,
    scanner: Mutex<ExpiryScanner>,
}

impl SwapEngine {
    pub fn new(config: SwapEngineConfig, store: Arc<dyn ColdStore>) -> Self {
        let limiter =
            SwapRateLimiter::new(config.inflight_slowdown_bytes, config.inflight_stop_bytes);
        let scanner = Mutex::new(ExpiryScanner::new(config.expire_scan_limit));
        SwapEngine {
            config,
            store,
            keyspaces: DashMap::new(),
            limiter,
            scanner,
        }
    }

    pub fn config(&self) -> &SwapEngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ColdStore> {
        &self.store
    }

    pub fn limiter(&self) -> &SwapRateLimiter {
        &self.limiter
    }

    /// Fetch or create a keyspace.
    pub fn keyspace(&self, id: u32) -> Arc<Keyspace> {
        self.keyspaces
            .entry(id)
            .or_insert_with(|| Arc::new(Keyspace::new(id)))
            .clone()
    }

    /// Snapshot a key's tier state for analysis.
    pub(crate) fn key_state(&self, ks: &Keyspace, key: &[u8]) -> KeyState {
        let (resident, dirty, kind) = match ks.entry(key) {
            Some(entry) => (true, entry.dirty, Some(entry.value.kind())),
            None => (false, false, None),
        };
        let meta = ks.meta(key);
        KeyState {
            resident,
            dirty,
            kind: kind.or_else(|| meta.as_ref().map(|m| m.kind())),
            meta,
        }
    }

    /// Set a TTL on a key and register it with the expiry scanner, bounded
    /// by the configured candidate cap.
    pub fn set_expire(&self, ks_id: u32, key: &[u8], at_ms: i64) {
        self.keyspace(ks_id)
            .set_expire(key, at_ms, self.config.expire_candidates_max);
    }

    /// Walk a slice of the meta column family, restoring in-memory records
    /// for cold keys and registering their TTLs with the expiry scanner.
    /// Repeated calls resume where the last one stopped and wrap around at
    /// the end of the keyspace. Returns how many records were examined.
    ///
    /// This is how TTLs and the version counter survive a restart: the
    /// expires table is rebuilt lazily from the persisted meta records, and
    /// every version seen raises the keyspace's allocation floor so no
    /// prior generation's data range is ever reissued.
    pub async fn scan_expire_candidates(&self, ks_id: u32) -> Result<usize, SwapError> {
        let ks = self.keyspace(ks_id);
        let range_start = ks_id.to_be_bytes().to_vec();
        let range_end = match ks_id.checked_add(1) {
            Some(next) => next.to_be_bytes().to_vec(),
            None => vec![0xff; 5],
        };
        let limit = self.scanner.lock().next_limit();

        let seek = {
            let cursor = ks.expire_seek.lock();
            if cursor.is_empty() {
                range_start.clone()
            } else {
                cursor.clone()
            }
        };
        let rows = self.store.scan(Cf::Meta, &seek, &range_end, limit).await?;
        let scanned = rows.len();
        let mut next_seek = Vec::new();
        for (raw_key, raw_value) in rows {
            // Resume just past this record next time.
            next_seek = raw_key.clone();
            next_seek.push(0x00);
            let (_, key) = decode_meta_key(&raw_key)?;
            let record = decode_meta_value(&raw_value)?;
            ks.observe_version(record.version);
            if !ks.metas.contains_key(&key) && !ks.entries.contains_key(&key) {
                let meta = ObjectMeta::decode(record.kind, record.version, &record.extension)?;
                ks.metas.insert(key.clone(), meta);
            }
            if record.expire_at != NO_EXPIRE {
                if !ks.expires.contains_key(&key) {
                    ks.expires.insert(key.clone(), record.expire_at);
                }
                ks.add_expire_candidate(
                    &key,
                    record.expire_at,
                    self.config.expire_candidates_max,
                );
            }
        }
        // An exhausted range wraps around to the start.
        *ks.expire_seek.lock() = if scanned < limit { Vec::new() } else { next_seek };
        Ok(scanned)
    }

    /// Run one expiry scan cycle against a keyspace: examine due
    /// candidates, delete keys whose TTL really lapsed, and adapt the next
    /// cycle's scan limit to the observed stale fraction. The drain is
    /// bounded twice over, by the scan limit and by the configured time
    /// budget; undrained candidates simply wait for the next tick.
    pub async fn expire_cycle(&self, ks_id: u32, now_ms: i64) -> Result<usize, SwapError> {
        let ks = self.keyspace(ks_id);
        let limit = self.scanner.lock().next_limit();
        let deadline = Instant::now() + Duration::from_millis(self.config.expire_cycle_time_ms);
        let mut scanned = 0;
        let mut expired = 0;
        while scanned < limit {
            let key = {
                let mut candidates = ks.expire_candidates.lock();
                match candidates.iter().next().cloned() {
                    Some(first) if first.0 <= now_ms => {
                        candidates.remove(&first);
                        first.1
                    }
                    _ => break,
                }
            };
            scanned += 1;
            // The candidate set is advisory; the expires table decides.
            match ks.expire_at(&key) {
                Some(at) if at <= now_ms => {
                    self.delete(ks_id, &key).await?;
                    expired += 1;
                }
                _ => {}
            }
            // At least one candidate moves per cycle, then the clock rules.
            if Instant::now() >= deadline {
                break;
            }
        }
        let stale = {
            let mut scanner = self.scanner.lock();
            scanner.observe(scanned, expired);
            scanner.stale_percent()
        };
        crate::metrics::record_expired(expired);
        crate::metrics::set_expire_stale_percent(stale);
        Ok(expired)
    }
}
