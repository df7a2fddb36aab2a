// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write-side execution: moving resident data to the cold tier and
//! removing keys' disk footprints.

use tracing::{debug, instrument};

use crate::codec::{
    data_range, encode_data_key, encode_meta_key, encode_meta_value, encode_score_key,
    score_range, NO_EXPIRE,
};
use crate::keyspace::{Keyspace, Value};
use crate::meta::{ListMeta, ObjectKind, ObjectMeta, SegmentKind, INITIAL_RIDX};
use crate::storage::{Cf, WriteBatch};

use super::access::{kind_label, ridx_subkey};
use super::{analyze, AccessMode, SwapEngine, SwapError, SwapIntention};

/// What happened to a key the eviction pass examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    /// Dirty data was written to the cold tier.
    Swapped,
    /// The resident copy was clean; it was dropped without I/O.
    Freed,
    /// Nothing resident to begin with.
    AlreadyCold,
    /// No such key.
    Absent,
}

impl EvictOutcome {
    fn label(self) -> &'static str {
        match self {
            EvictOutcome::Swapped => "swapped",
            EvictOutcome::Freed => "freed",
            EvictOutcome::AlreadyCold => "already_cold",
            EvictOutcome::Absent => "absent",
        }
    }
}

impl SwapEngine {
    /// Evict one key, moving at most one step budget of data. Big
    /// collections shrink over repeated calls; each step leaves the key in
    /// a consistent warm state.
    #[instrument(skip(self, key), fields(ks = ks_id))]
    pub async fn evict_key(&self, ks_id: u32, key: &[u8]) -> Result<EvictOutcome, SwapError> {
        let ks = self.keyspace(ks_id);
        let outcome = self.evict_step(&ks, key).await?;
        crate::metrics::record_evict(outcome.label());
        Ok(outcome)
    }

    /// Evict a batch of keys; returns how many moved or freed data.
    pub async fn evict_keys(&self, ks_id: u32, keys: &[Vec<u8>]) -> Result<usize, SwapError> {
        let mut moved = 0;
        for key in keys {
            match self.evict_key(ks_id, key).await? {
                EvictOutcome::Swapped | EvictOutcome::Freed => moved += 1,
                EvictOutcome::AlreadyCold | EvictOutcome::Absent => {}
            }
        }
        Ok(moved)
    }

    /// Remove a key from both tiers. Returns whether the key existed.
    pub async fn delete(&self, ks_id: u32, key: &[u8]) -> Result<bool, SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(false);
        }
        let plan = analyze(&state, &AccessMode::Delete);
        if plan.intention == SwapIntention::Del {
            let meta = state
                .meta
                .ok_or(SwapError::Inconsistent("delete planned without meta"))?;
            crate::metrics::record_swap(plan.intention.label(), kind_label(meta.kind()));
            self.delete_cold_state(&ks, key, &meta, plan.flags.skip_data_delete)
                .await?;
        }
        ks.purge(key);
        Ok(true)
    }

    /// Delete a key's disk footprint. With `skip_data_delete` only the meta
    /// record goes; orphaned data keys are left for the compaction filter.
    /// Whole-key data is version 0 and invisible to the filter, so it is
    /// always deleted eagerly.
    pub(crate) async fn delete_cold_state(
        &self,
        ks: &Keyspace,
        key: &[u8],
        meta: &ObjectMeta,
        skip_data_delete: bool,
    ) -> Result<(), SwapError> {
        let mut batch = WriteBatch::new();
        batch.delete(Cf::Meta, encode_meta_key(ks.id(), key));
        if meta.kind() == ObjectKind::String {
            batch.delete(Cf::Data, encode_data_key(ks.id(), key, 0, None));
        } else if !skip_data_delete {
            let (start, end) = data_range(ks.id(), key, meta.version);
            batch.delete_range(Cf::Data, start, end);
            if meta.kind() == ObjectKind::Zset {
                let (start, end) = score_range(ks.id(), key, meta.version);
                batch.delete_range(Cf::Score, start, end);
            }
        }
        self.store().write(batch).await?;
        Ok(())
    }

    async fn evict_step(&self, ks: &Keyspace, key: &[u8]) -> Result<EvictOutcome, SwapError> {
        let state = self.key_state(ks, key);
        if state.absent() {
            return Ok(EvictOutcome::Absent);
        }
        if !state.resident {
            return Ok(EvictOutcome::AlreadyCold);
        }

        // Clean non-list entries were loaded from disk and never changed;
        // the disk copies are still valid, so dropping the resident copy is
        // enough. Lists never qualify: resident elements are the only copy.
        if !state.dirty && state.meta.is_some() && state.kind != Some(ObjectKind::List) {
            return self.free_clean(ks, key, &state.meta).await;
        }

        let kind = state
            .kind
            .ok_or(SwapError::Inconsistent("resident entry without kind"))?;
        crate::metrics::record_swap("out", kind_label(kind));
        let _timer = crate::metrics::SwapTimer::new("out");
        self.limiter().throttle().await;

        let batch = match kind {
            ObjectKind::String => self.evict_string(ks, key)?,
            ObjectKind::List => self.evict_list(ks, key)?,
            _ => self.evict_members(ks, key, kind)?,
        };
        let bytes = batch.put_bytes();
        let _guard = self.limiter().admit(bytes);
        crate::metrics::record_swap_bytes("out", bytes);
        self.store().write(batch).await?;
        Ok(EvictOutcome::Swapped)
    }

    async fn free_clean(
        &self,
        ks: &Keyspace,
        key: &[u8],
        meta: &Option<ObjectMeta>,
    ) -> Result<EvictOutcome, SwapError> {
        let dropped = ks
            .entries
            .remove(key)
            .map(|(_, e)| e.value.len() as i64)
            .unwrap_or(0);
        if let Some(meta) = meta {
            let mut meta = meta.clone();
            if meta.kind().is_collection() && meta.kind() != ObjectKind::List {
                meta.modify_len(dropped);
            } else if meta.kind() == ObjectKind::String {
                // Whole-key residency is binary; nothing to count.
            }
            let mut batch = WriteBatch::new();
            batch.put(
                Cf::Meta,
                encode_meta_key(ks.id(), key),
                self.meta_record(ks, key, &meta),
            );
            self.store().write(batch).await?;
            ks.metas.insert(key.to_vec(), meta);
        }
        debug!(dropped, "freed clean entry");
        Ok(EvictOutcome::Freed)
    }

    fn evict_string(&self, ks: &Keyspace, key: &[u8]) -> Result<WriteBatch, SwapError> {
        let (_, entry) = ks
            .entries
            .remove(key)
            .ok_or(SwapError::Inconsistent("evicted entry vanished"))?;
        let Value::String(raw) = entry.value else {
            return Err(SwapError::WrongKind {
                expected: ObjectKind::String,
                found: entry.value.kind(),
            });
        };
        // Whole-key data rides version 0 in the data key so the compaction
        // filter never touches it; the meta record still takes a real
        // version so fragments of any prior collection under this key get
        // fenced off.
        let version = ks
            .meta(key)
            .map(|m| m.version)
            .unwrap_or_else(|| ks.alloc_version());
        let meta = ObjectMeta::new_len(ObjectKind::String, version, 0);
        let mut batch = WriteBatch::new();
        batch.put(Cf::Data, encode_data_key(ks.id(), key, 0, None), raw);
        batch.put(
            Cf::Meta,
            encode_meta_key(ks.id(), key),
            self.meta_record(ks, key, &meta),
        );
        ks.metas.insert(key.to_vec(), meta);
        Ok(batch)
    }

    fn evict_members(
        &self,
        ks: &Keyspace,
        key: &[u8],
        kind: ObjectKind,
    ) -> Result<WriteBatch, SwapError> {
        let mut meta = match ks.meta(key) {
            Some(meta) => meta,
            None => ObjectMeta::new_len(kind, ks.alloc_version(), 0),
        };
        let version = meta.version;
        let max_subkeys = self.config().evict_step_max_subkeys;
        let max_bytes = self.config().evict_step_max_bytes;

        let mut batch = WriteBatch::new();
        let mut moved = 0i64;
        let entry_empty;
        {
            let mut entry_ref = ks
                .entries
                .get_mut(key)
                .ok_or(SwapError::Inconsistent("evicted entry vanished"))?;
            let mut spent = 0usize;
            let mut picked: Vec<Vec<u8>> = Vec::new();
            match &entry_ref.value {
                Value::Hash(map) => {
                    for (field, value) in map {
                        if picked.len() >= max_subkeys || spent >= max_bytes {
                            break;
                        }
                        spent += field.len() + value.len();
                        picked.push(field.clone());
                    }
                }
                Value::Set(set) => {
                    for member in set {
                        if picked.len() >= max_subkeys || spent >= max_bytes {
                            break;
                        }
                        spent += member.len();
                        picked.push(member.clone());
                    }
                }
                Value::Zset(map) => {
                    for (member, _) in map {
                        if picked.len() >= max_subkeys || spent >= max_bytes {
                            break;
                        }
                        spent += member.len() + 8;
                        picked.push(member.clone());
                    }
                }
                other => {
                    return Err(SwapError::WrongKind {
                        expected: kind,
                        found: other.kind(),
                    })
                }
            }
            for field in picked {
                match &mut entry_ref.value {
                    Value::Hash(map) => {
                        if let Some(value) = map.remove(&field) {
                            batch.put(
                                Cf::Data,
                                encode_data_key(ks.id(), key, version, Some(&field)),
                                value,
                            );
                            moved += 1;
                        }
                    }
                    Value::Set(set) => {
                        if set.remove(&field) {
                            batch.put(
                                Cf::Data,
                                encode_data_key(ks.id(), key, version, Some(&field)),
                                Vec::new(),
                            );
                            moved += 1;
                        }
                    }
                    Value::Zset(map) => {
                        if let Some(score) = map.remove(&field) {
                            batch.put(
                                Cf::Data,
                                encode_data_key(ks.id(), key, version, Some(&field)),
                                score.to_le_bytes().to_vec(),
                            );
                            batch.put(
                                Cf::Score,
                                encode_score_key(ks.id(), key, version, score, &field),
                                Vec::new(),
                            );
                            moved += 1;
                        }
                    }
                    _ => unreachable!(),
                }
            }
            entry_empty = entry_ref.value.is_empty();
        }
        meta.modify_len(moved);
        batch.put(
            Cf::Meta,
            encode_meta_key(ks.id(), key),
            self.meta_record(ks, key, &meta),
        );
        ks.metas.insert(key.to_vec(), meta);
        if entry_empty {
            ks.entries.remove(key);
        }
        debug!(moved, fully_cold = entry_empty, "evicted collection step");
        Ok(batch)
    }

    fn evict_list(&self, ks: &Keyspace, key: &[u8]) -> Result<WriteBatch, SwapError> {
        let mut meta = match ks.meta(key) {
            Some(meta) => meta,
            None => {
                let len = ks
                    .entry(key)
                    .map(|e| e.value.len() as i64)
                    .unwrap_or(0);
                ObjectMeta::new_list(
                    ks.alloc_version(),
                    ListMeta::whole(SegmentKind::Hot, INITIAL_RIDX, len),
                )
            }
        };
        let version = meta.version;
        let budget = self
            .config()
            .evict_step_max_subkeys
            .min(self.config().evict_step_max_bytes / self.config().list_element_size_estimate.max(1))
            as i64;

        let mut batch = WriteBatch::new();
        let entry_empty;
        {
            let list = meta
                .list_mut()
                .ok_or(SwapError::Inconsistent("list meta without segments"))?;
            let mut entry_ref = ks
                .entries
                .get_mut(key)
                .ok_or(SwapError::Inconsistent("evicted entry vanished"))?;
            let Value::List(deque) = &mut entry_ref.value else {
                return Err(SwapError::WrongKind {
                    expected: ObjectKind::List,
                    found: entry_ref.value.kind(),
                });
            };
            let picks = list.swap_out_ranges(budget);
            // Highest first, so earlier removals don't shift later hot
            // positions.
            for seg in picks.segments().iter().rev() {
                for ridx in (seg.start..seg.end()).rev() {
                    let at = list
                        .hot_index_of(ridx)
                        .ok_or(SwapError::Inconsistent("picked index not hot"))?;
                    let element = deque
                        .remove(at as usize)
                        .ok_or(SwapError::Inconsistent("hot index outside value"))?;
                    batch.put(
                        Cf::Data,
                        encode_data_key(ks.id(), key, version, Some(&ridx_subkey(ridx))),
                        element,
                    );
                    list.update(ridx, SegmentKind::Cold)?;
                }
            }
            entry_empty = deque.is_empty();
        }
        batch.put(
            Cf::Meta,
            encode_meta_key(ks.id(), key),
            self.meta_record(ks, key, &meta),
        );
        ks.metas.insert(key.to_vec(), meta);
        if entry_empty {
            ks.entries.remove(key);
        }
        Ok(batch)
    }

    /// Encode the persisted meta record for a key, folding in its TTL.
    pub(crate) fn meta_record(&self, ks: &Keyspace, key: &[u8], meta: &ObjectMeta) -> Vec<u8> {
        let expire_at = ks.expire_at(key).unwrap_or(NO_EXPIRE);
        encode_meta_value(meta.kind(), expire_at, meta.version, &meta.encode_extension())
    }
}
