// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Meta value codec and the order-preserving float encoding.
//!
//! A meta record is `[1-byte kind tag][i64 LE expire, -1 = none][u64 BE
//! version][kind-specific extension]`. The record must be stable across
//! process restarts: it is loaded back at startup and consulted by the
//! compaction filter, never recomputed.

use crate::meta::object::ObjectKind;

use super::CodecError;

/// Expiry sentinel for keys without a TTL.
pub const NO_EXPIRE: i64 = -1;

/// Decoded meta column-family record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaValue {
    pub kind: ObjectKind,
    /// Epoch millis; [`NO_EXPIRE`] when the key has no TTL.
    pub expire_at: i64,
    pub version: u64,
    /// Kind-specific bytes: element count for hash/set/zset, serialized
    /// segment list for list, empty for string.
    pub extension: Vec<u8>,
}

pub fn encode_meta_value(kind: ObjectKind, expire_at: i64, version: u64, extension: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(17 + extension.len());
    raw.push(kind.tag());
    raw.extend_from_slice(&expire_at.to_le_bytes());
    raw.extend_from_slice(&version.to_be_bytes());
    raw.extend_from_slice(extension);
    raw
}

pub fn decode_meta_value(raw: &[u8]) -> Result<MetaValue, CodecError> {
    if raw.len() < 17 {
        return Err(CodecError::Truncated {
            need: 17,
            have: raw.len(),
        });
    }
    let kind = ObjectKind::from_tag(raw[0]).ok_or(CodecError::UnknownKind(raw[0]))?;
    let expire_at = i64::from_le_bytes(raw[1..9].try_into().unwrap());
    let version = u64::from_be_bytes(raw[9..17].try_into().unwrap());
    Ok(MetaValue {
        kind,
        expire_at,
        version,
        extension: raw[17..].to_vec(),
    })
}

/// Extension payload for length-counted kinds (hash/set/zset).
pub fn encode_len_extension(len: i64) -> Vec<u8> {
    len.to_le_bytes().to_vec()
}

pub fn decode_len_extension(raw: &[u8]) -> Result<i64, CodecError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| CodecError::Truncated {
        need: 8,
        have: raw.len(),
    })?;
    let len = i64::from_le_bytes(bytes);
    if len < 0 {
        // A negative count can only come from corruption.
        return Err(CodecError::Truncated { need: 8, have: 8 });
    }
    Ok(len)
}

/// Encode an f64 so that bytewise comparison of the result matches numeric
/// comparison of the input: flip all bits of negatives, set the sign bit of
/// non-negatives.
pub fn encode_score_f64(score: f64) -> [u8; 8] {
    let mut bits = score.to_bits();
    if bits >> 63 == 1 {
        bits = !bits;
    } else {
        bits |= 0x8000_0000_0000_0000;
    }
    bits.to_be_bytes()
}

pub fn decode_score_f64(raw: [u8; 8]) -> f64 {
    let mut bits = u64::from_be_bytes(raw);
    if bits >> 63 == 0 {
        bits = !bits;
    } else {
        bits &= 0x7fff_ffff_ffff_ffff;
    }
    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_value_round_trip() {
        let ext = encode_len_extension(12);
        let raw = encode_meta_value(ObjectKind::Hash, 1_700_000_000_000, 7, &ext);
        let mv = decode_meta_value(&raw).unwrap();
        assert_eq!(mv.kind, ObjectKind::Hash);
        assert_eq!(mv.expire_at, 1_700_000_000_000);
        assert_eq!(mv.version, 7);
        assert_eq!(decode_len_extension(&mv.extension).unwrap(), 12);
    }

    #[test]
    fn meta_value_no_expire() {
        let raw = encode_meta_value(ObjectKind::String, NO_EXPIRE, 0, &[]);
        let mv = decode_meta_value(&raw).unwrap();
        assert_eq!(mv.expire_at, NO_EXPIRE);
        assert!(mv.extension.is_empty());
    }

    #[test]
    fn meta_value_rejects_garbage() {
        assert!(decode_meta_value(b"foo").is_err());
        let mut raw = encode_meta_value(ObjectKind::Set, NO_EXPIRE, 1, &[]);
        raw[0] = 0xee;
        assert!(matches!(
            decode_meta_value(&raw),
            Err(CodecError::UnknownKind(0xee))
        ));
    }

    #[test]
    fn len_extension_rejects_negative() {
        let raw = (-1i64).to_le_bytes();
        assert!(decode_len_extension(&raw).is_err());
    }

    #[test]
    fn score_encoding_preserves_order() {
        let scores = [
            f64::NEG_INFINITY,
            -1e100,
            -2.0,
            -0.5,
            0.0,
            0.5,
            2.0,
            1e100,
            f64::INFINITY,
        ];
        let encoded: Vec<_> = scores.iter().map(|s| encode_score_f64(*s)).collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);
        for (s, e) in scores.iter().zip(&encoded) {
            assert_eq!(decode_score_f64(*e), *s);
        }
    }
}
