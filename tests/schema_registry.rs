//! Schema and Registry Invariant Tests
//!
//! - Child layouts append to their parent without overlap
//! - Every registered tag maps to exactly one kind and back
//! - Unknown tags surface as corruption, never as an empty result
//! - A record written through base fields hydrates as its concrete kind

use std::any::Any;
use std::sync::Arc;

use nodedb::registry::{Node, NodeTypeRegistry, RecordNode, Tag};
use nodedb::schema::{KindBuilder, Ownership, NODE_HEADER_SIZE};
use nodedb::store::{Address, MemoryStore, Store};
use nodedb::{NodeDb, NodeError};

// =============================================================================
// Helper Types
// =============================================================================

#[derive(Debug)]
struct Child {
    address: Address,
}

impl Node for Child {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Layout Arithmetic Tests
// =============================================================================

/// Child size is parent size plus the child's own fields.
#[test]
fn test_child_size_is_parent_plus_own_fields() {
    let mut base = KindBuilder::node("Base").make_abstract();
    base.add_long("a");
    base.add_string("b");
    base.add_many_to_one("owner", Ownership::Reference);
    let base = base.finish();

    let mut child = KindBuilder::extending("Child", &base);
    child.add_bool("c");
    child.add_double("d");
    let child = child.finish();

    let own: u32 = child.own_fields().iter().map(|f| f.size()).sum();
    assert_eq!(child.size(), base.size() + own);
    assert_eq!(base.size(), NODE_HEADER_SIZE + 8 + 8 + 12);
}

/// No two fields of a kind share a byte, and all lie inside the record.
#[test]
fn test_fields_never_overlap() {
    let mut base = KindBuilder::node("Base").make_abstract();
    base.add_byte("b");
    base.add_int("i");
    base.add_char("c");
    let base = base.finish();

    let mut mid = KindBuilder::extending("Mid", &base).make_abstract();
    mid.add_short("s");
    mid.add_float("f");
    let mid = mid.finish();

    let mut leaf = KindBuilder::extending("Leaf", &mid);
    leaf.add_long("l");
    leaf.add_one_to_one("peer", Ownership::Reference);
    let leaf = leaf.finish();

    let mut ranges: Vec<(u32, u32)> = leaf
        .fields()
        .iter()
        .map(|f| (f.offset(), f.offset() + f.size()))
        .collect();
    ranges.sort_unstable();
    assert_eq!(ranges[0].0, NODE_HEADER_SIZE);
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlap {:?}", pair);
    }
    assert!(ranges.iter().all(|&(_, end)| end <= leaf.size()));
    assert!(leaf.extends(&base));
    assert!(leaf.extends(&mid));
    assert!(!base.extends(&leaf));
}

// =============================================================================
// Registry Round-Trip Tests
// =============================================================================

#[test]
fn test_registry_round_trip() {
    let mut types = NodeTypeRegistry::new();
    let mut kinds = Vec::new();
    for tag in 1..=20u16 {
        let mut builder = KindBuilder::node(format!("Kind{}", tag));
        builder.add_int("value");
        let kind = builder.finish();
        types.register_record(tag, &kind).unwrap();
        kinds.push((tag, kind));
    }

    for (tag, kind) in &kinds {
        assert_eq!(types.tag_for_kind(kind), Some(*tag));
        assert_eq!(types.kind_for_tag(*tag).unwrap(), kind);
        let node = types.create_node(Address::new(0x40), *tag).unwrap();
        assert_eq!(node.tag(), *tag);
        assert!(node.is::<RecordNode>());
    }

    let spare = KindBuilder::node("Spare").finish();
    let err = types.register_record(7, &spare).unwrap_err();
    assert_eq!(err.code().code(), "ND_REGISTRY_DUPLICATE_TAG");
    assert_eq!(types.len(), 20);
}

#[test]
fn test_unknown_tag_is_corruption() {
    let types = NodeTypeRegistry::new();
    let err = types.create_node(Address::new(0x40), 99).unwrap_err();
    assert!(matches!(err, NodeError::UnknownTag { tag: 99, .. }));
    assert!(err.is_corruption());
}

#[test]
fn test_tag_range_is_sixteen_bits() {
    let mut types = NodeTypeRegistry::new();
    let kind = KindBuilder::node("Wide").finish();
    let err = types.register_raw(0x1_0000, &kind, |address| {
        Box::new(RecordNode::new(address, 0))
    });
    assert_eq!(
        err.unwrap_err().code().code(),
        "ND_REGISTRY_TAG_OUT_OF_RANGE"
    );
    types.register_raw(0xffff, &kind, |address| {
        Box::new(RecordNode::new(address, 0xffff))
    })
    .unwrap();
}

// =============================================================================
// End-to-End Scenario
// =============================================================================

/// Abstract base {int, byte}, concrete child {string}, tag 1.
#[test]
fn test_end_to_end_hydration() {
    let mut base = KindBuilder::node("Base").make_abstract();
    let number = base.add_int("number");
    let small = base.add_byte("small");
    let base = base.finish();

    let mut child = KindBuilder::extending("Child", &base);
    let label = child.add_string("label");
    let child = child.finish();

    let mut types = NodeTypeRegistry::new();
    types
        .register(1, &child, |address| Box::new(Child { address }))
        .unwrap();
    let types = Arc::new(types);

    let mut db = NodeDb::new(Box::new(MemoryStore::new()), Arc::clone(&types));
    let address = db.allocate(&child).unwrap();
    number.put(db.store_mut(), address, 42).unwrap();
    small.put(db.store_mut(), address, 7).unwrap();
    label.put(db.store_mut(), address, "x").unwrap();

    let tag = db.tag_at(address).unwrap();
    let node = types.create_node(address, tag).unwrap();
    assert_eq!(node.tag(), 1);
    assert_eq!(node.address(), address);
    assert!(node.downcast_ref::<Child>().is_some());

    assert_eq!(number.get(db.store(), address).unwrap(), 42);
    assert_eq!(small.get(db.store(), address).unwrap(), 7);
    assert_eq!(label.get(db.store(), address).unwrap(), "x");
    assert_eq!(
        db.describe(address),
        format!("Child{} {{ number=42, small=7, label=\"x\" }}", address)
    );
}

/// Deleting a record releases every block it allocated.
#[test]
fn test_delete_releases_record_and_strings() {
    let mut builder = KindBuilder::node("Named");
    let name = builder.add_string("name");
    let kind = builder.finish();
    let mut types = NodeTypeRegistry::new();
    types.register_record(3, &kind).unwrap();

    let mut db = NodeDb::new(Box::new(MemoryStore::new()), Arc::new(types));
    let address = db.allocate(&kind).unwrap();
    name.put(db.store_mut(), address, "first").unwrap();
    name.put(db.store_mut(), address, "second").unwrap();
    db.delete(address).unwrap();

    let store = db.into_store();
    let memory = store.as_any().downcast_ref::<MemoryStore>().unwrap();
    assert_eq!(memory.allocated_blocks(), 0);
}
