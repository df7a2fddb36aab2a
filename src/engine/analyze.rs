// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The swap decision table.
//!
//! Pure classification: given how a command is about to touch a key and a
//! snapshot of the key's tier state, decide what must move. No I/O
//! happens here, which is what makes the table testable row by row.

use crate::meta::{ObjectKind, ObjectMeta};

use super::{AccessMode, ExecFlags, SwapIntention, SwapPlan};

/// Snapshot of one key's residency at analysis time.
#[derive(Debug, Clone)]
pub struct KeyState {
    /// A value is resident in the hot tier.
    pub resident: bool,
    /// The resident value has unpersisted changes.
    pub dirty: bool,
    /// Kind from whichever tier knows it.
    pub kind: Option<ObjectKind>,
    pub meta: Option<ObjectMeta>,
}

impl KeyState {
    /// Nothing in either tier.
    pub fn absent(&self) -> bool {
        !self.resident && self.meta.is_none()
    }

    /// The cold tier holds elements the hot tier does not. A meta without
    /// a resident value always means cold data, whatever its count says,
    /// since whole-key records track no per-element length.
    fn has_cold(&self) -> bool {
        match &self.meta {
            Some(meta) => !meta.is_hot() || !self.resident,
            None => false,
        }
    }
}

/// Decide the movement for one access. The returned plan still carries the
/// caller's subkey/range selection; range padding and budget trimming
/// happen at execution time where the config is at hand.
pub fn analyze(state: &KeyState, mode: &AccessMode) -> SwapPlan {
    if state.absent() {
        return SwapPlan::nop();
    }
    match mode {
        AccessMode::Read => {
            if !state.has_cold() {
                return SwapPlan::nop();
            }
            let mut plan = load_all(state);
            plan.flags.exec_in_del = state.kind == Some(ObjectKind::List);
            plan
        }
        AccessMode::ReadFields(fields) => {
            if !state.has_cold() {
                return SwapPlan::nop();
            }
            SwapPlan {
                intention: SwapIntention::In,
                flags: ExecFlags::default(),
                subkeys: Some(fields.clone()),
                ranges: None,
            }
        }
        AccessMode::ReadRange(_) => {
            if !state.has_cold() {
                return SwapPlan::nop();
            }
            // Range selection happens at execution; lists always load
            // exec-in-del so each element lives in exactly one tier.
            SwapPlan {
                intention: SwapIntention::In,
                flags: ExecFlags {
                    exec_in_del: true,
                    ..ExecFlags::default()
                },
                subkeys: None,
                ranges: None,
            }
        }
        AccessMode::Cardinality => {
            // Counts are answerable from resident length plus the meta's
            // cold count. A fully cold key materializes a placeholder so
            // repeated counts stay in memory.
            let mut flags = ExecFlags {
                meta_only: true,
                ..ExecFlags::default()
            };
            if !state.resident && state.meta.is_some() {
                flags.mock_value = true;
            }
            SwapPlan {
                intention: SwapIntention::Nop,
                flags,
                subkeys: None,
                ranges: None,
            }
        }
        AccessMode::ReadThenDelete => {
            if !state.has_cold() {
                // Nothing left on disk worth loading; drop the meta record
                // and let compaction reclaim any stale fragments.
                let skip = state.meta.is_some();
                return SwapPlan {
                    intention: if skip {
                        SwapIntention::Del
                    } else {
                        SwapIntention::Nop
                    },
                    flags: ExecFlags {
                        skip_data_delete: skip,
                        ..ExecFlags::default()
                    },
                    subkeys: None,
                    ranges: None,
                };
            }
            let mut plan = load_all(state);
            plan.flags.exec_in_del = true;
            // A fully cold value only passes through the hot tier; the
            // consuming delete purges it.
            plan.flags.mock_value = !state.resident;
            plan
        }
        AccessMode::Write(fields) => {
            if !state.has_cold() {
                return SwapPlan::nop();
            }
            // Writes pull the affected members in and delete them from
            // disk, so memory is the single authority for mutated data.
            let mut plan = match fields {
                Some(fields) => SwapPlan {
                    intention: SwapIntention::In,
                    flags: ExecFlags::default(),
                    subkeys: Some(fields.clone()),
                    ranges: None,
                },
                None => load_all(state),
            };
            plan.flags.exec_in_del = true;
            plan
        }
        AccessMode::Delete => {
            if state.meta.is_none() {
                return SwapPlan::nop();
            }
            let skip = !state.has_cold();
            SwapPlan {
                intention: SwapIntention::Del,
                flags: ExecFlags {
                    skip_data_delete: skip,
                    ..ExecFlags::default()
                },
                subkeys: None,
                ranges: None,
            }
        }
    }
}

fn load_all(state: &KeyState) -> SwapPlan {
    let ranges = state
        .meta
        .as_ref()
        .and_then(|m| m.list())
        .map(|list| list.swap_in_ranges(&crate::meta::ListMeta::whole(
            crate::meta::SegmentKind::Hot,
            list.ridx_shift(),
            list.total(),
        ), 0));
    SwapPlan {
        intention: SwapIntention::In,
        flags: ExecFlags::default(),
        subkeys: None,
        ranges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ListMeta, SegmentKind};

    fn hot_state(kind: ObjectKind) -> KeyState {
        KeyState {
            resident: true,
            dirty: true,
            kind: Some(kind),
            meta: None,
        }
    }

    fn cold_hash(len: i64) -> KeyState {
        KeyState {
            resident: false,
            dirty: false,
            kind: Some(ObjectKind::Hash),
            meta: Some(ObjectMeta::new_len(ObjectKind::Hash, 3, len)),
        }
    }

    fn warm_hash(len: i64) -> KeyState {
        KeyState {
            resident: true,
            dirty: false,
            ..cold_hash(len)
        }
    }

    #[test]
    fn absent_key_never_moves() {
        let state = KeyState {
            resident: false,
            dirty: false,
            kind: None,
            meta: None,
        };
        for mode in [
            AccessMode::Read,
            AccessMode::Cardinality,
            AccessMode::ReadThenDelete,
            AccessMode::Delete,
        ] {
            assert_eq!(analyze(&state, &mode), SwapPlan::nop());
        }
    }

    #[test]
    fn hot_read_is_nop() {
        assert_eq!(
            analyze(&hot_state(ObjectKind::Hash), &AccessMode::Read),
            SwapPlan::nop()
        );
    }

    #[test]
    fn cold_read_loads_everything() {
        let plan = analyze(&cold_hash(5), &AccessMode::Read);
        assert_eq!(plan.intention, SwapIntention::In);
        assert!(plan.subkeys.is_none());
        assert!(!plan.flags.exec_in_del);
    }

    #[test]
    fn field_read_loads_named_fields() {
        let plan = analyze(
            &warm_hash(2),
            &AccessMode::ReadFields(vec![b"f".to_vec()]),
        );
        assert_eq!(plan.intention, SwapIntention::In);
        assert_eq!(plan.subkeys, Some(vec![b"f".to_vec()]));
    }

    #[test]
    fn cardinality_is_meta_only() {
        let plan = analyze(&cold_hash(5), &AccessMode::Cardinality);
        assert_eq!(plan.intention, SwapIntention::Nop);
        assert!(plan.flags.meta_only);
        assert!(plan.flags.mock_value);
        // Warm keys answer from memory plus meta, no placeholder needed.
        let plan = analyze(&warm_hash(5), &AccessMode::Cardinality);
        assert!(plan.flags.meta_only);
        assert!(!plan.flags.mock_value);
    }

    #[test]
    fn consume_of_drained_key_skips_data_delete() {
        let plan = analyze(&warm_hash(0), &AccessMode::ReadThenDelete);
        assert_eq!(plan.intention, SwapIntention::Del);
        assert!(plan.flags.skip_data_delete);
    }

    #[test]
    fn consume_of_cold_key_mocks_the_value() {
        let plan = analyze(&cold_hash(5), &AccessMode::ReadThenDelete);
        assert_eq!(plan.intention, SwapIntention::In);
        assert!(plan.flags.exec_in_del);
        assert!(plan.flags.mock_value);
        // Warm: the resident value is the install target, no mock.
        let plan = analyze(&warm_hash(5), &AccessMode::ReadThenDelete);
        assert!(plan.flags.exec_in_del);
        assert!(!plan.flags.mock_value);
    }

    #[test]
    fn writes_load_and_claim_affected_members() {
        let plan = analyze(
            &warm_hash(5),
            &AccessMode::Write(Some(vec![b"f".to_vec()])),
        );
        assert_eq!(plan.intention, SwapIntention::In);
        assert!(plan.flags.exec_in_del);
        assert_eq!(plan.subkeys, Some(vec![b"f".to_vec()]));
    }

    #[test]
    fn delete_without_cold_data_skips_data_keys() {
        let plan = analyze(&warm_hash(0), &AccessMode::Delete);
        assert_eq!(plan.intention, SwapIntention::Del);
        assert!(plan.flags.skip_data_delete);
        let plan = analyze(&cold_hash(3), &AccessMode::Delete);
        assert!(!plan.flags.skip_data_delete);
    }

    #[test]
    fn list_reads_carry_exec_in_del() {
        let mut list = ListMeta::new();
        list.append(SegmentKind::Hot, 100, 5).unwrap();
        list.append(SegmentKind::Cold, 105, 5).unwrap();
        let state = KeyState {
            resident: true,
            dirty: false,
            kind: Some(ObjectKind::List),
            meta: Some(ObjectMeta::new_list(2, list)),
        };
        let plan = analyze(&state, &AccessMode::ReadRange(vec![(0, -1)]));
        assert_eq!(plan.intention, SwapIntention::In);
        assert!(plan.flags.exec_in_del);

        let plan = analyze(&state, &AccessMode::Read);
        assert!(plan.flags.exec_in_del);
        let ranges = plan.ranges.expect("whole-list load has ranges");
        assert_eq!(ranges.total(), 5);
        assert_eq!(ranges.first().unwrap().start, 105);
    }
}
