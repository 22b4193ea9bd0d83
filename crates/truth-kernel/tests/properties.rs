//! Property tests across the canonicalizer, adapters and chains.

use proptest::prelude::*;
use serde_json::{Map, Value};
use truth_kernel::core::{build_chain, encode_with_hash, find_chain_break, verify_chain};
use truth_kernel::store::{LoadOptions, SaveOptions};
use truth_kernel::{canonicalize_json, hash_str, MemoryAdapter, PersistSource, PersistenceAdapter};
use truth_kernel_testkit::generators::{
    canon_txs, finite_f64, json_value, object_entries, persist_key,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn canonical_form_is_deterministic(v in json_value()) {
        let first = canonicalize_json(&v).unwrap();
        for _ in 0..100 {
            prop_assert_eq!(&canonicalize_json(&v).unwrap(), &first);
        }
    }

    #[test]
    fn canonical_form_ignores_insertion_order(
        entries in object_entries(),
        rotate in any::<prop::sample::Index>(),
    ) {
        let forward: Map<String, Value> = entries.iter().cloned().collect();
        let mut shuffled = entries.clone();
        let len = shuffled.len();
        shuffled.rotate_left(rotate.index(len));
        shuffled.reverse();
        let backward: Map<String, Value> = shuffled.into_iter().collect();
        prop_assert_eq!(
            canonicalize_json(&Value::Object(forward)).unwrap(),
            canonicalize_json(&Value::Object(backward)).unwrap()
        );
    }

    #[test]
    fn load_after_save_matches_data_hash(key in persist_key(), data in json_value()) {
        let adapter = MemoryAdapter::default();
        let loaded = runtime().block_on(async {
            adapter
                .save(&key, &data, &PersistSource::USER, &SaveOptions::default())
                .await
                .unwrap();
            adapter.load(&key, &LoadOptions::default()).await.unwrap()
        });
        prop_assert!(loaded.verified);
        prop_assert_eq!(*loaded.data_hash(), encode_with_hash(&data).unwrap().hash);
    }

    #[test]
    fn any_finite_float_survives_save_and_load(f in finite_f64()) {
        let adapter = MemoryAdapter::default();
        let data = serde_json::json!({"reading": f});
        let loaded = runtime().block_on(async {
            adapter
                .save("float", &data, &PersistSource::USER, &SaveOptions::default())
                .await
                .unwrap();
            adapter.load("float", &LoadOptions::strict()).await
        });
        let loaded = loaded.unwrap();
        prop_assert!(loaded.verified);
        prop_assert_eq!(loaded.data()["reading"].as_f64(), Some(f));
    }

    #[test]
    fn tampered_parent_is_located(
        txs in canon_txs(12),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut entries = build_chain(&txs).unwrap();
        prop_assert!(verify_chain(&entries));

        let i = pick.index(entries.len());
        entries[i].parent_cumulative_hash = hash_str("tampered");
        prop_assert_eq!(find_chain_break(&entries), Some(i));
        prop_assert!(!verify_chain(&entries));
    }
}
