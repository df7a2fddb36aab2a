// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Binary codecs for the cold tier.
//!
//! Three key layouts share a common prefix (`[u32 keyspace id][u32 key len]
//! [key bytes]`, all integers big-endian) so that a meta key is a strict
//! prefix of every data key for the same user key, and a single bounded range
//! scan retrieves exactly the subkeys of one (key, version) pair.

pub mod keys;
pub mod values;

pub use keys::{
    data_range, decode_data_key, decode_meta_key, decode_score_key, encode_data_key,
    encode_meta_key, encode_score_key, score_range, DataKey, ScoreKey, SUBKEY_FLAG_END,
    SUBKEY_FLAG_NONE, SUBKEY_FLAG_SUBKEY,
};
pub use values::{
    decode_len_extension, decode_meta_value, decode_score_f64, encode_len_extension,
    encode_meta_value, encode_score_f64, MetaValue, NO_EXPIRE,
};

use thiserror::Error;

/// Malformed bytes read back from storage. Always fatal to the operation
/// that observed them; callers must not substitute defaults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown object kind tag {0:#04x}")]
    UnknownKind(u8),
    #[error("unknown subkey flag {0:#04x}")]
    UnknownFlag(u8),
    #[error("trailing {0} undecoded bytes")]
    TrailingBytes(usize),
    #[error("inconsistent record: {0}")]
    Corrupt(&'static str),
}
