// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Object metadata: the in-memory twin of the persisted meta record.
//!
//! An [`ObjectMeta`] exists for every key that has (or had) fragments on
//! disk. For hash, set and zset it carries a single count of non-resident
//! elements; for lists it carries the full [`ListMeta`] segment map. The
//! version inside is the fencing token the compaction filter compares
//! against data-key versions.

use crate::codec::CodecError;

use super::segments::{ListMeta, SegmentKind};

/// Value kinds that can spill to disk. The tag byte is the first byte of
/// the persisted meta record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    String,
    Hash,
    Set,
    Zset,
    List,
}

impl ObjectKind {
    pub fn tag(self) -> u8 {
        match self {
            ObjectKind::String => b'K',
            ObjectKind::Hash => b'H',
            ObjectKind::Set => b'S',
            ObjectKind::Zset => b'Z',
            ObjectKind::List => b'L',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'K' => Some(ObjectKind::String),
            b'H' => Some(ObjectKind::Hash),
            b'S' => Some(ObjectKind::Set),
            b'Z' => Some(ObjectKind::Zset),
            b'L' => Some(ObjectKind::List),
            _ => None,
        }
    }

    /// Kinds whose elements are addressed by subkey rather than whole-value.
    pub fn is_collection(self) -> bool {
        !matches!(self, ObjectKind::String)
    }
}

/// Kind-specific residency payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaPayload {
    /// Count of NON-resident elements. Strings always carry 0.
    Len(i64),
    /// Full segment map for lists.
    List(ListMeta),
}

/// In-memory metadata for one swappable key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    kind: ObjectKind,
    pub version: u64,
    payload: MetaPayload,
}

impl ObjectMeta {
    pub fn new_len(kind: ObjectKind, version: u64, len: i64) -> Self {
        debug_assert!(!matches!(kind, ObjectKind::List));
        ObjectMeta {
            kind,
            version,
            payload: MetaPayload::Len(len),
        }
    }

    pub fn new_list(version: u64, list: ListMeta) -> Self {
        ObjectMeta {
            kind: ObjectKind::List,
            version,
            payload: MetaPayload::List(list),
        }
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Number of elements that live only on disk.
    pub fn cold_len(&self) -> i64 {
        match &self.payload {
            MetaPayload::Len(len) => *len,
            MetaPayload::List(list) => list.cold_len(),
        }
    }

    /// A hot meta tracks nothing on disk; the key behaves as pure-memory.
    pub fn is_hot(&self) -> bool {
        self.cold_len() == 0
    }

    /// Adjust the non-resident count. Positive when elements move to disk
    /// (clean-object after eviction), negative when loaded fragments merge
    /// back into memory. Lists adjust through their segment map instead.
    pub fn modify_len(&mut self, delta: i64) {
        match &mut self.payload {
            MetaPayload::Len(len) => {
                *len += delta;
                debug_assert!(*len >= 0);
            }
            MetaPayload::List(_) => unreachable!("list residency is segment-tracked"),
        }
    }

    pub fn list(&self) -> Option<&ListMeta> {
        match &self.payload {
            MetaPayload::List(list) => Some(list),
            MetaPayload::Len(_) => None,
        }
    }

    pub fn list_mut(&mut self) -> Option<&mut ListMeta> {
        match &mut self.payload {
            MetaPayload::List(list) => Some(list),
            MetaPayload::Len(_) => None,
        }
    }

    pub fn set_list(&mut self, list: ListMeta) {
        debug_assert_eq!(self.kind, ObjectKind::List);
        self.payload = MetaPayload::List(list);
    }

    /// Kind-specific bytes of the persisted meta record.
    pub fn encode_extension(&self) -> Vec<u8> {
        match &self.payload {
            MetaPayload::Len(_) if self.kind == ObjectKind::String => Vec::new(),
            MetaPayload::Len(len) => len.to_le_bytes().to_vec(),
            MetaPayload::List(list) => encode_list_extension(list),
        }
    }

    pub fn decode(kind: ObjectKind, version: u64, extension: &[u8]) -> Result<Self, CodecError> {
        let payload = match kind {
            ObjectKind::String => {
                if !extension.is_empty() {
                    return Err(CodecError::TrailingBytes(extension.len()));
                }
                MetaPayload::Len(0)
            }
            ObjectKind::Hash | ObjectKind::Set | ObjectKind::Zset => {
                MetaPayload::Len(crate::codec::decode_len_extension(extension)?)
            }
            ObjectKind::List => MetaPayload::List(decode_list_extension(extension)?),
        };
        Ok(ObjectMeta {
            kind,
            version,
            payload,
        })
    }
}

/// List extension wire format: `[i64 LE total][u32 LE nsegs]` followed by
/// `[u8 kind][i64 LE start][i64 LE len]` per segment. Kind 0 is hot,
/// 1 is cold.
fn encode_list_extension(list: &ListMeta) -> Vec<u8> {
    let mut raw = Vec::with_capacity(12 + list.num_segments() * 17);
    raw.extend_from_slice(&list.total().to_le_bytes());
    raw.extend_from_slice(&(list.num_segments() as u32).to_le_bytes());
    for seg in list.segments() {
        raw.push(match seg.kind {
            SegmentKind::Hot => 0,
            SegmentKind::Cold => 1,
        });
        raw.extend_from_slice(&seg.start.to_le_bytes());
        raw.extend_from_slice(&seg.len.to_le_bytes());
    }
    raw
}

fn decode_list_extension(raw: &[u8]) -> Result<ListMeta, CodecError> {
    if raw.len() < 12 {
        return Err(CodecError::Truncated {
            need: 12,
            have: raw.len(),
        });
    }
    let total = i64::from_le_bytes(raw[0..8].try_into().unwrap());
    let nsegs = u32::from_le_bytes(raw[8..12].try_into().unwrap()) as usize;
    let need = 12 + nsegs * 17;
    if raw.len() < need {
        return Err(CodecError::Truncated {
            need,
            have: raw.len(),
        });
    }
    if raw.len() > need {
        return Err(CodecError::TrailingBytes(raw.len() - need));
    }
    let mut list = ListMeta::new();
    let mut at = 12;
    for _ in 0..nsegs {
        let kind = match raw[at] {
            0 => SegmentKind::Hot,
            1 => SegmentKind::Cold,
            other => return Err(CodecError::UnknownFlag(other)),
        };
        let start = i64::from_le_bytes(raw[at + 1..at + 9].try_into().unwrap());
        let len = i64::from_le_bytes(raw[at + 9..at + 17].try_into().unwrap());
        at += 17;
        list.append(kind, start, len)
            .map_err(|_| CodecError::Corrupt("list segments out of order"))?;
    }
    if list.total() != total {
        return Err(CodecError::Corrupt("list segment lengths disagree with total"));
    }
    Ok(list)
}
