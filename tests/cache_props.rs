// tests/cache_props.rs

use std::collections::BTreeMap;

use proptest::prelude::*;
use taskengine::cache::fingerprint::fingerprint_of;
use taskengine::cache::{CacheKey, FieldKind, FieldValue, SubformResultCache, ViewSnapshot};
use taskengine::types::TaskMode;

fn field_strategy() -> impl Strategy<Value = Option<FieldValue>> {
    let alpha = "[a-zA-Z0-9 ]{0,10}".prop_map(|s| FieldValue::new(FieldKind::Alpha, s));
    let numeric = (0i64..100_000).prop_map(|n| FieldValue::new(FieldKind::Numeric, n.to_string()));
    let date = (1900u32..2100, 1u32..13, 1u32..29)
        .prop_map(|(y, m, d)| FieldValue::new(FieldKind::Date, format!("{y:04}{m:02}{d:02}")));
    let time = (0u32..24, 0u32..60, 0u32..60)
        .prop_map(|(h, m, s)| FieldValue::new(FieldKind::Time, format!("{h:02}{m:02}{s:02}")));
    let boolean = any::<bool>()
        .prop_map(|b| FieldValue::new(FieldKind::Boolean, if b { "1" } else { "0" }));

    prop_oneof![
        alpha.prop_map(Some),
        numeric.prop_map(Some),
        date.prop_map(Some),
        time.prop_map(Some),
        boolean.prop_map(Some),
        Just(None),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Put { key: i32, rows: usize, size: usize },
    Remove { key: i32, record: bool },
    EvictAll,
    ClearDeleted,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0i32..8, 0usize..5, 1usize..16).prop_map(|(key, rows, size)| Op::Put { key, rows, size }),
        3 => (0i32..8, any::<bool>()).prop_map(|(key, record)| Op::Remove { key, record }),
        1 => Just(Op::EvictAll),
        1 => Just(Op::ClearDeleted),
    ]
}

fn snapshot(key: i32, rows: usize, size: usize) -> ViewSnapshot {
    ViewSnapshot::new(CacheKey(key), vec![vec!["x".to_string()]; rows], size)
}

proptest! {
    #[test]
    fn fingerprint_is_pure(values in proptest::collection::vec(field_strategy(), 0..6)) {
        prop_assert_eq!(fingerprint_of(&values), fingerprint_of(&values.clone()));
    }

    #[test]
    fn fingerprint_changes_with_any_contributing_value(
        prefix in proptest::collection::vec(field_strategy(), 0..3),
        a in "[a-z0-9]{0,12}",
        b in "[a-z0-9]{0,12}",
    ) {
        prop_assume!(a != b);
        let mut left = prefix.clone();
        left.push(Some(FieldValue::new(FieldKind::Alpha, a)));
        let mut right = prefix;
        right.push(Some(FieldValue::new(FieldKind::Alpha, b)));
        prop_assert_ne!(fingerprint_of(&left), fingerprint_of(&right));
    }

    #[test]
    fn live_keys_and_eviction_ledger_stay_disjoint_and_sized(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let mut cache = SubformResultCache::new();
        let mut model: BTreeMap<i32, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put { key, rows, size } => {
                    cache.put_in_cache(snapshot(key, rows, size), TaskMode::Modify);
                    model.insert(key, rows * size);
                }
                Op::Remove { key, record } => {
                    let removed = cache.remove_from_cache(CacheKey(key), record);
                    prop_assert_eq!(removed, model.remove(&key).is_some());
                }
                Op::EvictAll => {
                    cache.evict_all();
                    model.clear();
                }
                Op::ClearDeleted => cache.clear_deleted_list(),
            }

            for key in cache.keys() {
                prop_assert!(!cache.deleted_list().contains(&key));
            }
            let entry_sum: usize = cache
                .keys()
                .filter_map(|k| cache.entry(k))
                .map(|e| e.size_bytes())
                .sum();
            prop_assert_eq!(cache.total_size(), entry_sum);
            prop_assert_eq!(cache.total_size(), model.values().sum::<usize>());
            prop_assert_eq!(cache.len(), model.len());
        }
    }
}
