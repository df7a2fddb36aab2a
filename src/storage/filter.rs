// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Compaction-time reclamation of fenced-off data fragments.
//!
//! Deleting or recreating a swapped key never touches its old data keys;
//! the key just gets a fresher version, and the old fragments become
//! unreachable. This filter finds them during compaction by comparing the
//! version baked into each data key against the live meta record.

use tracing::warn;

use crate::codec::{decode_data_key, decode_meta_value, encode_meta_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Drop,
}

/// Decide one data-cf entry. `lookup_meta` resolves the encoded meta key to
/// the current meta record bytes, if any.
///
/// Rules:
/// - whole-key data (version 0) is never reclaimed here
/// - no live meta record means the key is gone; drop the fragment
/// - a meta version newer than the fragment's version means the fragment
///   was fenced off; drop it
/// - any decode failure keeps the entry, reclamation must never eat data
///   it does not understand
pub fn filter_decision<F>(data_key: &[u8], lookup_meta: F) -> FilterDecision
where
    F: FnOnce(&[u8]) -> Option<Vec<u8>>,
{
    let decoded = match decode_data_key(data_key) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "undecodable data key during compaction, keeping");
            return FilterDecision::Keep;
        }
    };
    if decoded.version == 0 {
        return FilterDecision::Keep;
    }
    let meta_key = encode_meta_key(decoded.keyspace_id, &decoded.key);
    let Some(meta_raw) = lookup_meta(&meta_key) else {
        return FilterDecision::Drop;
    };
    match decode_meta_value(&meta_raw) {
        Ok(meta) if meta.version > decoded.version => FilterDecision::Drop,
        Ok(_) => FilterDecision::Keep,
        Err(err) => {
            warn!(error = %err, "undecodable meta record during compaction, keeping");
            FilterDecision::Keep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_data_key, encode_meta_value, NO_EXPIRE};
    use crate::meta::ObjectKind;

    fn meta_raw(version: u64) -> Vec<u8> {
        let ext = crate::codec::encode_len_extension(3);
        encode_meta_value(ObjectKind::Hash, NO_EXPIRE, version, &ext)
    }

    #[test]
    fn version_zero_is_never_dropped() {
        let key = encode_data_key(1, b"str", 0, None);
        assert_eq!(filter_decision(&key, |_| None), FilterDecision::Keep);
    }

    #[test]
    fn missing_meta_drops_fragment() {
        let key = encode_data_key(1, b"h", 7, Some(b"f"));
        assert_eq!(filter_decision(&key, |_| None), FilterDecision::Drop);
    }

    #[test]
    fn stale_version_drops_fragment() {
        let key = encode_data_key(1, b"h", 7, Some(b"f"));
        assert_eq!(
            filter_decision(&key, |_| Some(meta_raw(8))),
            FilterDecision::Drop
        );
    }

    #[test]
    fn current_version_is_kept() {
        let key = encode_data_key(1, b"h", 7, Some(b"f"));
        assert_eq!(
            filter_decision(&key, |_| Some(meta_raw(7))),
            FilterDecision::Keep
        );
        // A fragment can never be newer than its meta, but if observed it
        // must survive.
        assert_eq!(
            filter_decision(&key, |_| Some(meta_raw(6))),
            FilterDecision::Keep
        );
    }

    #[test]
    fn decode_failures_keep_the_entry() {
        assert_eq!(
            filter_decision(b"junk", |_| None),
            FilterDecision::Keep
        );
        let key = encode_data_key(1, b"h", 7, Some(b"f"));
        assert_eq!(
            filter_decision(&key, |_| Some(b"bad".to_vec())),
            FilterDecision::Keep
        );
    }
}
