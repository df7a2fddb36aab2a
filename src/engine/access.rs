// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-side execution: everything that loads cold fragments back into
//! the hot tier before a command runs.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, instrument};

use crate::codec::{
    data_range, decode_data_key, encode_data_key, encode_meta_key, encode_score_key,
    score_range,
};
use crate::keyspace::{Entry, Keyspace, Value};
use crate::meta::{ListMeta, ObjectKind, ObjectMeta, SegmentKind};
use crate::storage::{Cf, WriteBatch};

use super::{analyze, AccessMode, SwapEngine, SwapError, SwapIntention, SwapPlan};

/// Big-endian ridx, so list subkeys sort by logical position.
pub(crate) fn ridx_subkey(ridx: i64) -> [u8; 8] {
    debug_assert!(ridx >= 0);
    (ridx as u64).to_be_bytes()
}

pub(crate) fn subkey_ridx(subkey: &[u8]) -> Result<i64, SwapError> {
    let bytes: [u8; 8] = subkey
        .try_into()
        .map_err(|_| SwapError::Inconsistent("list subkey is not 8 bytes"))?;
    Ok(u64::from_be_bytes(bytes) as i64)
}

impl SwapEngine {
    /// Make the whole value resident and return a copy of it.
    #[instrument(skip(self, key), fields(ks = ks_id))]
    pub async fn read(&self, ks_id: u32, key: &[u8]) -> Result<Option<Value>, SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(None);
        }
        let plan = analyze(&state, &AccessMode::Read);
        self.execute_in(&ks, key, &state.meta, &plan).await?;
        Ok(ks.entry(key).map(|e| e.value.clone()))
    }

    /// Make the named members resident and return a copy of the value.
    pub async fn read_fields(
        &self,
        ks_id: u32,
        key: &[u8],
        fields: &[Vec<u8>],
    ) -> Result<Option<Value>, SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(None);
        }
        if let Some(kind) = state.kind {
            if !kind.is_collection() || kind == ObjectKind::List {
                return Err(SwapError::WrongKind {
                    expected: ObjectKind::Hash,
                    found: kind,
                });
            }
        }
        let plan = analyze(&state, &AccessMode::ReadFields(fields.to_vec()));
        self.execute_in(&ks, key, &state.meta, &plan).await?;
        Ok(ks.entry(key).map(|e| e.value.clone()))
    }

    /// Make the requested list ranges resident and return their elements in
    /// request order. Ranges use inclusive ends; negatives count from the
    /// tail.
    pub async fn read_range(
        &self,
        ks_id: u32,
        key: &[u8],
        ranges: &[(i64, i64)],
    ) -> Result<Option<Vec<Vec<u8>>>, SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(None);
        }
        if state.kind != Some(ObjectKind::List) {
            return Err(SwapError::WrongKind {
                expected: ObjectKind::List,
                found: state.kind.unwrap_or(ObjectKind::String),
            });
        }
        let mut plan = analyze(&state, &AccessMode::ReadRange(ranges.to_vec()));
        if plan.intention == SwapIntention::In {
            let meta = state
                .meta
                .as_ref()
                .ok_or(SwapError::Inconsistent("list load without meta"))?;
            let list = meta
                .list()
                .ok_or(SwapError::Inconsistent("list meta without segments"))?;
            let request = ListMeta::from_request(list.ridx_shift(), ranges, list.total());
            plan.ranges = request.map(|req| list.swap_in_ranges(&req, self.config().swap_in_padding));
            if plan.ranges.as_ref().map(|r| r.is_empty()).unwrap_or(true) {
                plan = SwapPlan::nop();
            }
        }
        self.execute_in(&ks, key, &state.meta, &plan).await?;

        // Everything requested is resident now; collect it.
        let entry = match ks.entry(key) {
            Some(entry) => entry,
            None => return Ok(Some(Vec::new())),
        };
        let Value::List(deque) = &entry.value else {
            return Err(SwapError::Inconsistent("list entry changed kind"));
        };
        let meta = ks.meta(key);
        let list = meta.as_ref().and_then(|m| m.list());
        let total = list.map_or(deque.len() as i64, |l| l.total());
        let shift = list.map_or(0, |l| l.ridx_shift());
        let mut out = Vec::new();
        for &(start, stop) in ranges {
            let mut start = if start < 0 { start + total } else { start };
            let stop = if stop < 0 { stop + total } else { stop };
            if start < 0 {
                start = 0;
            }
            for index in start..=stop.min(total - 1) {
                let at = match list {
                    Some(list) => list
                        .hot_index_of(shift + index)
                        .ok_or(SwapError::Inconsistent("requested index still cold"))?,
                    None => index,
                };
                if let Some(element) = deque.get(at as usize) {
                    out.push(element.clone());
                }
            }
        }
        Ok(Some(out))
    }

    /// Element count across both tiers, without loading data. A fully cold
    /// collection materializes an empty placeholder so repeated counts stay
    /// in memory; a string counts one whichever tier it lives in.
    pub async fn cardinality(&self, ks_id: u32, key: &[u8]) -> Result<Option<i64>, SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(None);
        }
        let plan = analyze(&state, &AccessMode::Cardinality);
        // String metas track no element count, and an empty resident
        // placeholder would hide the cold value from a later read.
        if state.kind == Some(ObjectKind::String) {
            return Ok(Some(1));
        }
        let resident = ks.entry(key).map_or(0, |e| e.value.len() as i64);
        let cold = state.meta.as_ref().map_or(0, |m| m.cold_len());
        if plan.flags.mock_value {
            let meta = state
                .meta
                .as_ref()
                .ok_or(SwapError::Inconsistent("placeholder without meta"))?;
            let placeholder = match meta.kind() {
                ObjectKind::Hash => Value::Hash(HashMap::new()),
                ObjectKind::Set => Value::Set(HashSet::new()),
                ObjectKind::Zset => Value::Zset(HashMap::new()),
                ObjectKind::List => Value::List(VecDeque::new()),
                ObjectKind::String => unreachable!("strings count without a placeholder"),
            };
            ks.entries.insert(key.to_vec(), Entry::clean(placeholder));
        }
        Ok(Some(resident + cold))
    }

    /// Read the whole value out and delete the key from both tiers.
    pub async fn read_then_delete(
        &self,
        ks_id: u32,
        key: &[u8],
    ) -> Result<Option<Value>, SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(None);
        }
        let plan = analyze(&state, &AccessMode::ReadThenDelete);
        if plan.intention == SwapIntention::In {
            // Load everything; the loaded fragments are deleted from disk
            // in the same batch (exec-in-del).
            self.execute_in(&ks, key, &state.meta, &plan).await?;
        }
        let value = ks.entry(key).map(|e| e.value.clone());
        // Data keys are gone or fenced; only the meta record remains worth
        // deleting eagerly. Anything missed is reclaimed by compaction.
        if ks.meta(key).is_some() {
            let mut batch = WriteBatch::new();
            batch.delete(Cf::Meta, encode_meta_key(ks.id(), key));
            self.store().write(batch).await?;
        }
        ks.purge(key);
        Ok(value)
    }

    /// Load the members a write is about to touch and mark the entry dirty.
    /// `None` claims the whole value.
    pub async fn prepare_write(
        &self,
        ks_id: u32,
        key: &[u8],
        fields: Option<&[Vec<u8>]>,
    ) -> Result<(), SwapError> {
        let ks = self.keyspace(ks_id);
        let state = self.key_state(&ks, key);
        if state.absent() {
            return Ok(());
        }
        let plan = analyze(&state, &AccessMode::Write(fields.map(|f| f.to_vec())));
        self.execute_in(&ks, key, &state.meta, &plan).await?;
        if let Some(mut entry) = ks.entries.get_mut(key) {
            entry.dirty = true;
        }
        // A whole-value claim leaves nothing authoritative on disk.
        if plan.intention == SwapIntention::In && plan.subkeys.is_none() {
            if ks.meta(key).map(|m| m.is_hot()).unwrap_or(false) {
                let mut batch = WriteBatch::new();
                batch.delete(Cf::Meta, encode_meta_key(ks.id(), key));
                self.store().write(batch).await?;
                ks.metas.remove(key);
            }
        }
        Ok(())
    }

    /// Execute a load plan: fetch, merge into the hot tier, and apply the
    /// exec-in-del deletions in one batch.
    pub(crate) async fn execute_in(
        &self,
        ks: &Keyspace,
        key: &[u8],
        meta: &Option<ObjectMeta>,
        plan: &SwapPlan,
    ) -> Result<(), SwapError> {
        if plan.intention != SwapIntention::In {
            return Ok(());
        }
        let meta = meta
            .as_ref()
            .ok_or(SwapError::Inconsistent("load planned without meta"))?;
        crate::metrics::record_swap(plan.intention.label(), kind_label(meta.kind()));
        let _timer = crate::metrics::SwapTimer::new(plan.intention.label());
        self.limiter().throttle().await;

        match meta.kind() {
            ObjectKind::String => self.load_string(ks, key, meta, plan).await,
            ObjectKind::List => self.load_list(ks, key, meta, plan).await,
            _ => self.load_members(ks, key, meta, plan).await,
        }
    }

    async fn load_string(
        &self,
        ks: &Keyspace,
        key: &[u8],
        meta: &ObjectMeta,
        plan: &SwapPlan,
    ) -> Result<(), SwapError> {
        let data_key = encode_data_key(ks.id(), key, 0, None);
        let raw = self
            .store()
            .get(Cf::Data, &data_key)
            .await?
            .ok_or(SwapError::Inconsistent("cold string without data key"))?;
        let _guard = self.limiter().admit(raw.len());
        crate::metrics::record_swap_bytes("in", raw.len());
        let entry = if plan.flags.exec_in_del {
            Entry::dirty(Value::String(raw))
        } else {
            Entry::clean(Value::String(raw))
        };
        if !plan.flags.mock_value {
            ks.entries.insert(key.to_vec(), entry.clone());
            let mut m = meta.clone();
            m.modify_len(-m.cold_len());
            ks.metas.insert(key.to_vec(), m);
        } else {
            ks.entries.insert(key.to_vec(), entry);
        }
        if plan.flags.exec_in_del {
            let mut batch = WriteBatch::new();
            batch.delete(Cf::Data, data_key);
            batch.delete(Cf::Meta, encode_meta_key(ks.id(), key));
            self.store().write(batch).await?;
            ks.metas.remove(key);
        }
        Ok(())
    }

    async fn load_members(
        &self,
        ks: &Keyspace,
        key: &[u8],
        meta: &ObjectMeta,
        plan: &SwapPlan,
    ) -> Result<(), SwapError> {
        let kind = meta.kind();
        let version = meta.version;
        let mut batch = WriteBatch::new();

        let rows: Vec<(Vec<u8>, Vec<u8>)> = match &plan.subkeys {
            Some(fields) => {
                let keys: Vec<Vec<u8>> = fields
                    .iter()
                    .map(|f| encode_data_key(ks.id(), key, version, Some(f)))
                    .collect();
                let values = self.store().multi_get(Cf::Data, &keys).await?;
                let rows: Vec<(Vec<u8>, Vec<u8>)> = fields
                    .iter()
                    .zip(values)
                    .filter_map(|(f, v)| v.map(|v| (f.clone(), v)))
                    .collect();
                if plan.flags.exec_in_del {
                    for data_key in &keys {
                        batch.delete(Cf::Data, data_key.clone());
                    }
                    // Score rows carry the live version, so the compaction
                    // filter never fences them; a claimed member takes its
                    // score row along.
                    if kind == ObjectKind::Zset {
                        for (member, raw) in &rows {
                            let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
                                SwapError::Inconsistent("zset member without 8-byte score")
                            })?;
                            let score = f64::from_le_bytes(bytes);
                            batch.delete(
                                Cf::Score,
                                encode_score_key(ks.id(), key, version, score, member),
                            );
                        }
                    }
                }
                rows
            }
            None => {
                let (start, end) = data_range(ks.id(), key, version);
                let rows = self.store().scan(Cf::Data, &start, &end, 0).await?;
                if plan.flags.exec_in_del {
                    batch.delete_range(Cf::Data, start, end);
                    if kind == ObjectKind::Zset {
                        let (s, e) = score_range(ks.id(), key, version);
                        batch.delete_range(Cf::Score, s, e);
                    }
                }
                rows.into_iter()
                    .map(|(k, v)| Ok((decode_data_key(&k)?.subkey.unwrap_or_default(), v)))
                    .collect::<Result<_, SwapError>>()?
            }
        };

        let bytes: usize = rows.iter().map(|(k, v)| k.len() + v.len()).sum();
        let _guard = self.limiter().admit(bytes);
        crate::metrics::record_swap_bytes("in", bytes);

        let mut entry_ref = ks.entries.entry(key.to_vec()).or_insert_with(|| {
            let empty = match kind {
                ObjectKind::Hash => Value::Hash(HashMap::new()),
                ObjectKind::Set => Value::Set(HashSet::new()),
                ObjectKind::Zset => Value::Zset(HashMap::new()),
                _ => unreachable!("member load on non-collection"),
            };
            Entry::clean(empty)
        });
        // Whole-key loads make memory the sole authority (the key goes
        // hot, its meta record goes away), so the entry must be treated as
        // dirty even when the bytes were not changed.
        if plan.flags.exec_in_del || plan.subkeys.is_none() {
            entry_ref.dirty = true;
        }
        let mut merged = 0i64;
        for (field, raw) in rows {
            let fresh = match &mut entry_ref.value {
                // A resident copy is at least as new; never clobber it.
                Value::Hash(map) => {
                    if map.contains_key(&field) {
                        false
                    } else {
                        map.insert(field, raw);
                        true
                    }
                }
                Value::Set(set) => set.insert(field),
                Value::Zset(map) => {
                    if map.contains_key(&field) {
                        false
                    } else {
                        let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
                            SwapError::Inconsistent("zset member without 8-byte score")
                        })?;
                        map.insert(field, f64::from_le_bytes(bytes));
                        true
                    }
                }
                _ => {
                    return Err(SwapError::WrongKind {
                        expected: kind,
                        found: entry_ref.value.kind(),
                    })
                }
            };
            if fresh {
                merged += 1;
            }
        }
        drop(entry_ref);

        if plan.subkeys.is_none() {
            // Whole-key load: the key is hot again and hot keys carry no
            // meta. Any disk fragments not deleted here are orphaned by
            // the record removal and reclaimed at compaction.
            batch.delete(Cf::Meta, encode_meta_key(ks.id(), key));
            ks.metas.remove(key);
        } else {
            let mut m = meta.clone();
            m.modify_len(-merged.min(m.cold_len()));
            ks.metas.insert(key.to_vec(), m);
        }

        if !batch.is_empty() {
            self.store().write(batch).await?;
        }
        debug!(merged, "loaded collection members");
        Ok(())
    }

    async fn load_list(
        &self,
        ks: &Keyspace,
        key: &[u8],
        meta: &ObjectMeta,
        plan: &SwapPlan,
    ) -> Result<(), SwapError> {
        let Some(ranges) = &plan.ranges else {
            return Ok(());
        };
        if ranges.is_empty() {
            return Ok(());
        }
        let version = meta.version;
        let mut batch = WriteBatch::new();
        let mut rows: Vec<(i64, Vec<u8>)> = Vec::new();
        for seg in ranges.segments() {
            let start = encode_data_key(ks.id(), key, version, Some(&ridx_subkey(seg.start)));
            let end = encode_data_key(ks.id(), key, version, Some(&ridx_subkey(seg.end())));
            for (k, v) in self.store().scan(Cf::Data, &start, &end, 0).await? {
                let decoded = decode_data_key(&k)?;
                let subkey = decoded
                    .subkey
                    .ok_or(SwapError::Inconsistent("list row without subkey"))?;
                rows.push((subkey_ridx(&subkey)?, v));
            }
            // List loads always delete the loaded range: one tier per
            // element.
            batch.delete_range(Cf::Data, start, end);
        }
        rows.sort_by_key(|(ridx, _)| *ridx);
        let bytes: usize = rows.iter().map(|(_, v)| v.len() + 8).sum();
        let _guard = self.limiter().admit(bytes);
        crate::metrics::record_swap_bytes("in", bytes);

        let mut m = meta.clone();
        {
            let list = m
                .list_mut()
                .ok_or(SwapError::Inconsistent("list meta without segments"))?;
            let mut entry_ref = ks
                .entries
                .entry(key.to_vec())
                .or_insert_with(|| Entry::clean(Value::List(VecDeque::new())));
            entry_ref.dirty = true;
            let Value::List(deque) = &mut entry_ref.value else {
                return Err(SwapError::WrongKind {
                    expected: ObjectKind::List,
                    found: entry_ref.value.kind(),
                });
            };
            for (ridx, element) in rows {
                if !list.update(ridx, SegmentKind::Hot)? {
                    continue;
                }
                let at = list
                    .hot_index_of(ridx)
                    .ok_or(SwapError::Inconsistent("flipped index not hot"))?;
                deque.insert(at as usize, element);
            }
        }
        ks.metas.insert(key.to_vec(), m);
        self.store().write(batch).await?;
        Ok(())
    }
}

pub(crate) fn kind_label(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::String => "string",
        ObjectKind::Hash => "hash",
        ObjectKind::Set => "set",
        ObjectKind::Zset => "zset",
        ObjectKind::List => "list",
    }
}
