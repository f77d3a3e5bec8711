//! Property-based tests for pak-core
//!
//! These tests use proptest to verify tree and persistence invariants across a wide range of inputs.

use pak_core::{Codec, NoCompression, Node, Value};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn dotted_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..4)
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[ -~]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Build a tree from (path, value) writes, skipping writes that collide with an existing leaf
fn build_tree(writes: &[(Vec<String>, Value)], reads: &[Vec<String>]) -> Node {
    let mut pak = Node::new();
    for (segments, value) in writes {
        let _ = pak.set_path(&segments.join("."), value.clone());
    }
    for segments in reads {
        let _ = pak.get_path(&segments.join("."));
    }
    pak
}

proptest! {
    /// A value written at a path reads back unchanged
    #[test]
    fn set_then_lookup(segments in dotted_path(), value in leaf()) {
        let path = segments.join(".");
        let mut pak = Node::new();
        pak.set_path(&path, value.clone()).unwrap();
        prop_assert_eq!(pak.lookup_path(&path), Some(&value));
        prop_assert!(pak.contains_path(&path));
    }

    /// Culling twice is the same as culling once
    #[test]
    fn cull_is_idempotent(
        writes in prop::collection::vec((dotted_path(), leaf()), 0..8),
        reads in prop::collection::vec(dotted_path(), 0..8),
    ) {
        let mut pak = build_tree(&writes, &reads);
        pak.cull();
        let once = pak.clone();
        pak.cull();
        prop_assert_eq!(pak, once);
    }

    /// Culling never removes a leaf
    #[test]
    fn cull_preserves_leaves(
        writes in prop::collection::vec((dotted_path(), leaf()), 0..8),
        reads in prop::collection::vec(dotted_path(), 0..8),
    ) {
        let mut pak = build_tree(&writes, &reads);
        let before = pak.flatten();
        pak.cull();
        prop_assert_eq!(pak.flatten(), before);
    }

    /// Reading a path never changes what is eventually persisted
    #[test]
    fn reads_do_not_persist(
        writes in prop::collection::vec((dotted_path(), leaf()), 0..8),
        reads in prop::collection::vec(dotted_path(), 0..8),
    ) {
        let codec = Codec::new(NoCompression::new());
        let mut read = build_tree(&writes, &reads);
        let mut clean = build_tree(&writes, &[]);

        let read_loaded = codec.open_bytes(&codec.seal(&mut read, None).unwrap(), None).unwrap();
        let clean_loaded = codec.open_bytes(&codec.seal(&mut clean, None).unwrap(), None).unwrap();
        prop_assert_eq!(read_loaded.flatten(), clean_loaded.flatten());
    }

    /// Saving then loading yields the culled tree
    #[test]
    fn save_load_equals_culled(
        writes in prop::collection::vec((dotted_path(), leaf()), 0..8),
        reads in prop::collection::vec(dotted_path(), 0..8),
        password in prop::option::of("[a-z]{1,8}"),
    ) {
        let codec = Codec::new(NoCompression::new());
        let mut pak = build_tree(&writes, &reads);

        let bytes = codec.seal(&mut pak, password.as_deref()).unwrap();
        let loaded = codec.open_bytes(&bytes, password.as_deref()).unwrap();

        let mut expected = build_tree(&writes, &reads);
        expected.cull();
        prop_assert_eq!(loaded, expected);
    }
}
