// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key codecs for the meta, data and score column families.
//!
//! Layout (all integers big-endian so bytewise order matches numeric order):
//!
//! ```text
//! meta key:  [u32 ks_id][u32 key_len][key]
//! data key:  [u32 ks_id][u32 key_len][key][u64 version][flag][subkey]
//! score key: [u32 ks_id][u32 key_len][key][u64 version][flag][f64 score][member]
//! ```
//!
//! The flag byte orders `NONE < SUBKEY < END`, which is what makes
//! `[.. ver 0x01 "", .. ver 0x02)` a tight range over one version's subkeys.

use super::values::{decode_score_f64, encode_score_f64};
use super::CodecError;

/// Whole-key value, no subkey follows.
pub const SUBKEY_FLAG_NONE: u8 = 0x00;
/// A subkey (and for score keys, a score) follows.
pub const SUBKEY_FLAG_SUBKEY: u8 = 0x01;
/// Range-end sentinel; never stored.
pub const SUBKEY_FLAG_END: u8 = 0x02;

/// Decoded data key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataKey {
    pub keyspace_id: u32,
    pub key: Vec<u8>,
    pub version: u64,
    /// `None` for whole-key layouts (flag byte 0x00).
    pub subkey: Option<Vec<u8>>,
}

/// Decoded score key.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreKey {
    pub keyspace_id: u32,
    pub key: Vec<u8>,
    pub version: u64,
    pub score: f64,
    pub member: Vec<u8>,
}

pub fn encode_meta_key(keyspace_id: u32, key: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(8 + key.len());
    raw.extend_from_slice(&keyspace_id.to_be_bytes());
    raw.extend_from_slice(&(key.len() as u32).to_be_bytes());
    raw.extend_from_slice(key);
    raw
}

pub fn decode_meta_key(raw: &[u8]) -> Result<(u32, Vec<u8>), CodecError> {
    let (keyspace_id, key, rest) = split_prefix(raw)?;
    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes(rest.len()));
    }
    Ok((keyspace_id, key.to_vec()))
}

fn encode_data_key_raw(
    keyspace_id: u32,
    key: &[u8],
    version: u64,
    flag: u8,
    subkey: &[u8],
) -> Vec<u8> {
    let mut raw = Vec::with_capacity(8 + key.len() + 9 + subkey.len());
    raw.extend_from_slice(&keyspace_id.to_be_bytes());
    raw.extend_from_slice(&(key.len() as u32).to_be_bytes());
    raw.extend_from_slice(key);
    raw.extend_from_slice(&version.to_be_bytes());
    raw.push(flag);
    raw.extend_from_slice(subkey);
    raw
}

/// Encode a data key. `subkey == None` produces the whole-key layout used by
/// string values (flag 0x00, nothing after it).
pub fn encode_data_key(keyspace_id: u32, key: &[u8], version: u64, subkey: Option<&[u8]>) -> Vec<u8> {
    match subkey {
        Some(sk) => encode_data_key_raw(keyspace_id, key, version, SUBKEY_FLAG_SUBKEY, sk),
        None => encode_data_key_raw(keyspace_id, key, version, SUBKEY_FLAG_NONE, &[]),
    }
}

/// Half-open `[start, end)` bounds covering every subkey of one
/// (key, version) pair and nothing else.
pub fn data_range(keyspace_id: u32, key: &[u8], version: u64) -> (Vec<u8>, Vec<u8>) {
    (
        encode_data_key_raw(keyspace_id, key, version, SUBKEY_FLAG_SUBKEY, &[]),
        encode_data_key_raw(keyspace_id, key, version, SUBKEY_FLAG_END, &[]),
    )
}

pub fn decode_data_key(raw: &[u8]) -> Result<DataKey, CodecError> {
    let (keyspace_id, key, rest) = split_prefix(raw)?;
    if rest.len() < 9 {
        return Err(CodecError::Truncated {
            need: 9,
            have: rest.len(),
        });
    }
    let version = u64::from_be_bytes(rest[..8].try_into().unwrap());
    let flag = rest[8];
    let tail = &rest[9..];
    let subkey = match flag {
        SUBKEY_FLAG_NONE if tail.is_empty() => None,
        SUBKEY_FLAG_NONE => return Err(CodecError::TrailingBytes(tail.len())),
        SUBKEY_FLAG_SUBKEY => Some(tail.to_vec()),
        other => return Err(CodecError::UnknownFlag(other)),
    };
    Ok(DataKey {
        keyspace_id,
        key: key.to_vec(),
        version,
        subkey,
    })
}

/// Encode a score key: member ordered by (score, member) within one version,
/// enabling range-by-score iteration directly in the storage engine.
pub fn encode_score_key(
    keyspace_id: u32,
    key: &[u8],
    version: u64,
    score: f64,
    member: &[u8],
) -> Vec<u8> {
    let mut raw = encode_data_key_raw(keyspace_id, key, version, SUBKEY_FLAG_SUBKEY, &[]);
    raw.extend_from_slice(&encode_score_f64(score));
    raw.extend_from_slice(member);
    raw
}

/// `[start, end)` bounds over every score entry of one (key, version).
pub fn score_range(keyspace_id: u32, key: &[u8], version: u64) -> (Vec<u8>, Vec<u8>) {
    data_range(keyspace_id, key, version)
}

pub fn decode_score_key(raw: &[u8]) -> Result<ScoreKey, CodecError> {
    let (keyspace_id, key, rest) = split_prefix(raw)?;
    if rest.len() < 9 + 8 {
        return Err(CodecError::Truncated {
            need: 17,
            have: rest.len(),
        });
    }
    let version = u64::from_be_bytes(rest[..8].try_into().unwrap());
    let flag = rest[8];
    if flag != SUBKEY_FLAG_SUBKEY {
        return Err(CodecError::UnknownFlag(flag));
    }
    let score = decode_score_f64(rest[9..17].try_into().unwrap());
    Ok(ScoreKey {
        keyspace_id,
        key: key.to_vec(),
        version,
        score,
        member: rest[17..].to_vec(),
    })
}

/// Split `[u32 ks_id][u32 key_len][key]` off the front, returning the rest.
fn split_prefix(raw: &[u8]) -> Result<(u32, &[u8], &[u8]), CodecError> {
    if raw.len() < 8 {
        return Err(CodecError::Truncated {
            need: 8,
            have: raw.len(),
        });
    }
    let keyspace_id = u32::from_be_bytes(raw[..4].try_into().unwrap());
    let key_len = u32::from_be_bytes(raw[4..8].try_into().unwrap()) as usize;
    if raw.len() < 8 + key_len {
        return Err(CodecError::Truncated {
            need: 8 + key_len,
            have: raw.len(),
        });
    }
    Ok((keyspace_id, &raw[8..8 + key_len], &raw[8 + key_len..]))
}
