// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for the codec and segment layers.
//!
//! Uses proptest to generate random segment layouts, flip sequences and raw
//! bytes, and verifies the invariants hold and decoders never panic.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;

use swap_engine::codec::{
    decode_data_key, decode_meta_key, decode_meta_value, decode_score_f64, encode_data_key,
    encode_meta_key, encode_meta_value, encode_score_f64, data_range, NO_EXPIRE,
};
use swap_engine::meta::ValidMode;
use swap_engine::{ListMeta, ObjectKind, Segment, SegmentKind, INITIAL_RIDX};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate a strictly valid ListMeta: adjacent segments with alternating
/// kinds starting at an arbitrary ridx base.
fn list_meta_strategy() -> impl Strategy<Value = ListMeta> {
    (
        0i64..1000,                                          // base offset from INITIAL_RIDX
        any::<bool>(),                                       // kind of the first segment
        prop::collection::vec(1i64..20, 1..12),              // segment lengths
    )
        .prop_map(|(base, first_hot, lens)| {
            let mut meta = ListMeta::new();
            let mut cursor = INITIAL_RIDX - base;
            let mut kind = if first_hot {
                SegmentKind::Hot
            } else {
                SegmentKind::Cold
            };
            for len in lens {
                meta.append(kind, cursor, len).unwrap();
                cursor += len;
                kind = kind.flip();
            }
            meta
        })
}

fn object_kind_strategy() -> impl Strategy<Value = ObjectKind> {
    prop_oneof![
        Just(ObjectKind::String),
        Just(ObjectKind::Hash),
        Just(ObjectKind::Set),
        Just(ObjectKind::Zset),
        Just(ObjectKind::List),
    ]
}

/// Residency kind at a ridx, straight off the segment array.
fn kind_at(meta: &ListMeta, ridx: i64) -> Option<SegmentKind> {
    meta.segments()
        .iter()
        .find(|seg| seg.contains(ridx))
        .map(|seg| seg.kind)
}

// =============================================================================
// Segment Algebra Properties
// =============================================================================

proptest! {
    /// Point flips keep the meta strictly valid and never change the total.
    #[test]
    fn prop_update_preserves_validity_and_total(
        meta in list_meta_strategy(),
        flips in prop::collection::vec((0i64..200, any::<bool>()), 1..80),
    ) {
        let mut meta = meta;
        let total = meta.total();
        let base = meta.first().map(|s| s.start).unwrap();
        for (offset, hot) in flips {
            let ridx = base + offset % total;
            let kind = if hot { SegmentKind::Hot } else { SegmentKind::Cold };
            meta.update(ridx, kind).unwrap();
            prop_assert!(meta.is_valid(ValidMode::Strict));
            prop_assert_eq!(meta.total(), total);
            prop_assert_eq!(kind_at(&meta, ridx), Some(kind));
        }
    }

    /// Swap-in planning returns only indices that are cold and requested
    /// (modulo padding, which stays inside the cold segments it extends).
    #[test]
    fn prop_swap_in_picks_only_cold(
        meta in list_meta_strategy(),
        req_start in 0i64..200,
        req_len in 1i64..200,
        padding in 0i64..16,
    ) {
        let base = meta.first().map(|s| s.start).unwrap();
        let request = ListMeta::whole(SegmentKind::Hot, base + req_start % meta.total(), req_len);
        let picks = meta.swap_in_ranges(&request, padding);
        prop_assert!(picks.is_valid(ValidMode::Ranges));
        for seg in picks.segments() {
            for ridx in seg.start..seg.end() {
                prop_assert_eq!(kind_at(&meta, ridx), Some(SegmentKind::Cold));
            }
        }
        // Without padding the picks are exactly the cold part of the request.
        if padding == 0 {
            let cold_requested: i64 = (request.first().unwrap().start..request.first().unwrap().end())
                .filter(|&r| kind_at(&meta, r) == Some(SegmentKind::Cold))
                .count() as i64;
            prop_assert_eq!(picks.total(), cold_requested);
        }
    }

    /// Swap-out planning respects the element budget and only picks hot
    /// indices.
    #[test]
    fn prop_swap_out_respects_budget(
        meta in list_meta_strategy(),
        budget in 1i64..64,
    ) {
        let picks = meta.swap_out_ranges(budget);
        prop_assert!(picks.is_valid(ValidMode::Ranges));
        prop_assert!(picks.total() <= budget);
        prop_assert!(picks.total() <= meta.hot_len());
        for seg in picks.segments() {
            for ridx in seg.start..seg.end() {
                prop_assert_eq!(kind_at(&meta, ridx), Some(SegmentKind::Hot));
            }
        }
        // The budget is met whenever enough hot elements exist.
        prop_assert_eq!(picks.total(), budget.min(meta.hot_len()));
    }

    /// Hot indices enumerate densely: the n-th hot ridx maps to position n.
    #[test]
    fn prop_hot_index_is_dense(meta in list_meta_strategy()) {
        let mut expected = 0i64;
        for seg in meta.segments() {
            if seg.kind != SegmentKind::Hot {
                continue;
            }
            for ridx in seg.start..seg.end() {
                prop_assert_eq!(meta.hot_index_of(ridx), Some(expected));
                expected += 1;
            }
        }
        prop_assert_eq!(expected, meta.hot_len());
        // Cold indices never map.
        for seg in meta.segments() {
            if seg.kind == SegmentKind::Cold {
                prop_assert_eq!(meta.hot_index_of(seg.start), None);
            }
        }
    }

    /// Request normalization stays inside the list bounds.
    #[test]
    fn prop_from_request_stays_in_bounds(
        shift in 0i64..1000,
        list_len in 1i64..200,
        start in -300i64..300,
        end in -300i64..300,
    ) {
        if let Some(req) = ListMeta::from_request(shift, &[(start, end)], list_len) {
            prop_assert!(req.is_valid(ValidMode::Ranges));
            let seg: &Segment = req.first().unwrap();
            prop_assert!(seg.start >= shift);
            prop_assert!(seg.end() <= shift + list_len);
        }
    }
}

// =============================================================================
// Codec Properties
// =============================================================================

proptest! {
    /// Meta keys round-trip and data keys share the meta-key prefix, so one
    /// prefix scan covers both.
    #[test]
    fn prop_key_round_trip_and_prefix(
        ks in any::<u32>(),
        key in prop::collection::vec(any::<u8>(), 0..64),
        version in any::<u64>(),
        subkey in prop::option::of(prop::collection::vec(any::<u8>(), 0..32)),
    ) {
        let meta_key = encode_meta_key(ks, &key);
        prop_assert_eq!(decode_meta_key(&meta_key).unwrap(), (ks, key.clone()));

        let data_key = encode_data_key(ks, &key, version, subkey.as_deref());
        prop_assert!(data_key.starts_with(&meta_key));
        let decoded = decode_data_key(&data_key).unwrap();
        prop_assert_eq!(decoded.keyspace_id, ks);
        prop_assert_eq!(decoded.key, key);
        prop_assert_eq!(decoded.version, version);
        prop_assert_eq!(decoded.subkey, subkey);
    }

    /// Every subkey of a version falls inside that version's data range, and
    /// other versions fall outside it.
    #[test]
    fn prop_data_range_bounds_one_version(
        ks in any::<u32>(),
        key in prop::collection::vec(any::<u8>(), 0..32),
        version in 1u64..u64::MAX - 1,
        subkey in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let (start, end) = data_range(ks, &key, version);
        let inside = encode_data_key(ks, &key, version, Some(&subkey));
        prop_assert!(start.as_slice() <= inside.as_slice());
        prop_assert!(inside.as_slice() < end.as_slice());
        let newer = encode_data_key(ks, &key, version + 1, Some(&subkey));
        prop_assert!(newer.as_slice() >= end.as_slice());
        let older = encode_data_key(ks, &key, version - 1, Some(&subkey));
        prop_assert!(older.as_slice() < start.as_slice());
    }

    /// Meta records round-trip through the value codec.
    #[test]
    fn prop_meta_value_round_trip(
        kind in object_kind_strategy(),
        expire_at in prop_oneof![Just(NO_EXPIRE), 0i64..i64::MAX],
        version in any::<u64>(),
        extension in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let raw = encode_meta_value(kind, expire_at, version, &extension);
        let decoded = decode_meta_value(&raw).unwrap();
        prop_assert_eq!(decoded.kind, kind);
        prop_assert_eq!(decoded.expire_at, expire_at);
        prop_assert_eq!(decoded.version, version);
        prop_assert_eq!(decoded.extension, extension);
    }

    /// The score encoding preserves numeric order bytewise and is exactly
    /// invertible.
    #[test]
    fn prop_score_encoding_preserves_order(a in any::<f64>(), b in any::<f64>()) {
        prop_assume!(a.is_finite() && b.is_finite());
        // The two zeroes are numerically equal but encode differently.
        prop_assume!(a != b || a.to_bits() == b.to_bits());
        let ea = encode_score_f64(a);
        let eb = encode_score_f64(b);
        prop_assert_eq!(a.partial_cmp(&b).unwrap(), ea.cmp(&eb));
        prop_assert_eq!(decode_score_f64(ea).to_bits(), a.to_bits());
    }
}

// =============================================================================
// Decoder Fuzz Tests
// =============================================================================

proptest! {
    /// Key decoders never panic on arbitrary bytes, only return Err.
    #[test]
    fn fuzz_decode_keys_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_meta_key(&bytes);
        let _ = decode_data_key(&bytes);
    }

    /// The meta value decoder never panics on arbitrary bytes.
    #[test]
    fn fuzz_decode_meta_value_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_meta_value(&bytes);
    }

    /// A valid meta record survives arbitrary truncation without panicking,
    /// and an extension-level corruption surfaces when the record is turned
    /// into an ObjectMeta.
    #[test]
    fn fuzz_truncated_meta_record(
        version in any::<u64>(),
        len in 0i64..i64::MAX,
        cut in 0usize..25,
    ) {
        let ext = swap_engine::codec::encode_len_extension(len);
        let raw = encode_meta_value(ObjectKind::Hash, NO_EXPIRE, version, &ext);
        let cut = cut.min(raw.len());
        let truncated = &raw[..raw.len() - cut];
        match decode_meta_value(truncated) {
            Ok(value) => {
                // Header intact; a shortened extension must be rejected
                // downstream, not silently misread.
                let meta = swap_engine::ObjectMeta::decode(value.kind, value.version, &value.extension);
                if cut > 0 {
                    prop_assert!(meta.is_err());
                }
            }
            Err(_) => {}
        }
    }
}
