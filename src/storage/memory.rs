// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sorted in-process cold store. The production deployment sits on an LSM
//! engine; this backend keeps the same contract (atomic batches, ordered
//! range scans, compaction with a key filter) for embedding and tests.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::filter::FilterDecision;
use super::traits::{BatchOp, Cf, ColdStore, StorageError, WriteBatch};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

pub struct MemoryStore {
    data: RwLock<Tree>,
    meta: RwLock<Tree>,
    score: RwLock<Tree>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            data: RwLock::new(BTreeMap::new()),
            meta: RwLock::new(BTreeMap::new()),
            score: RwLock::new(BTreeMap::new()),
        }
    }

    fn tree(&self, cf: Cf) -> &RwLock<Tree> {
        match cf {
            Cf::Data => &self.data,
            Cf::Meta => &self.meta,
            Cf::Score => &self.score,
        }
    }

    pub fn len(&self, cf: Cf) -> usize {
        self.tree(cf).read().len()
    }

    pub fn is_empty(&self, cf: Cf) -> bool {
        self.len(cf) == 0
    }

    /// Run a compaction pass over one column family, dropping every entry
    /// the filter rejects. Returns the number of entries dropped.
    pub fn compact<F>(&self, cf: Cf, mut filter: F) -> usize
    where
        F: FnMut(&[u8], &[u8]) -> FilterDecision,
    {
        let mut tree = self.tree(cf).write();
        let before = tree.len();
        tree.retain(|key, value| filter(key, value) == FilterDecision::Keep);
        let dropped = before - tree.len();
        crate::metrics::record_compaction_dropped(dropped);
        dropped
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ColdStore for MemoryStore {
    async fn get(&self, cf: Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.tree(cf).read().get(key).cloned())
    }

    async fn multi_get(
        &self,
        cf: Cf,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Option<Vec<u8>>>, StorageError> {
        let tree = self.tree(cf).read();
        Ok(keys.iter().map(|k| tree.get(k).cloned()).collect())
    }

    async fn scan(
        &self,
        cf: Cf,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let tree = self.tree(cf).read();
        let iter = tree
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(if limit == 0 {
            iter.collect()
        } else {
            iter.take(limit).collect()
        })
    }

    async fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        // One lock per family for the whole batch keeps it atomic with
        // respect to readers of that family.
        let mut data = self.data.write();
        let mut meta = self.meta.write();
        let mut score = self.score.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { cf, key, value } => {
                    let tree = match cf {
                        Cf::Data => &mut data,
                        Cf::Meta => &mut meta,
                        Cf::Score => &mut score,
                    };
                    tree.insert(key, value);
                }
                BatchOp::Delete { cf, key } => {
                    let tree = match cf {
                        Cf::Data => &mut data,
                        Cf::Meta => &mut meta,
                        Cf::Score => &mut score,
                    };
                    tree.remove(&key);
                }
                BatchOp::DeleteRange { cf, start, end } => {
                    let tree = match cf {
                        Cf::Data => &mut data,
                        Cf::Meta => &mut meta,
                        Cf::Score => &mut score,
                    };
                    let doomed: Vec<Vec<u8>> = tree
                        .range::<[u8], _>((
                            Bound::Included(start.as_slice()),
                            Bound::Excluded(end.as_slice()),
                        ))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in doomed {
                        tree.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
