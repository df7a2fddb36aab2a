// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Minimal walkthrough: spill a hash to the cold tier field by field,
//! answer a count without loading anything, then warm the key back up.
//!
//! Run with: `cargo run --example basic_usage`

use std::collections::HashMap;
use std::sync::Arc;

use swap_engine::{MemoryStore, SwapEngine, SwapEngineConfig, Value};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = SwapEngineConfig {
        evict_step_max_subkeys: 2,
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::new());
    let engine = SwapEngine::new(config, store);

    let ks = engine.keyspace(0);
    let mut fields = HashMap::new();
    for i in 0..6 {
        fields.insert(
            format!("field-{i}").into_bytes(),
            format!("value-{i}").into_bytes(),
        );
    }
    ks.put(b"session:42".to_vec(), Value::Hash(fields));

    // Each eviction step moves at most two fields.
    let mut steps = 0;
    while ks.entry(b"session:42").is_some() {
        engine.evict_key(0, b"session:42").await.expect("evict");
        steps += 1;
    }
    println!("fully cold after {steps} eviction steps");

    // Counting needs only the metadata.
    let count = engine.cardinality(0, b"session:42").await.expect("count");
    println!("cardinality while cold: {count:?}");

    // Reading warms the key back up; it is pure memory again afterwards.
    let value = engine.read(0, b"session:42").await.expect("read");
    if let Some(Value::Hash(map)) = value {
        println!("loaded {} fields back", map.len());
    }
    println!(
        "meta record after full load: {:?}",
        engine.keyspace(0).meta(b"session:42")
    );
}
