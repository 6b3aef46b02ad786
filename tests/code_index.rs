//! Code Index Tests
//!
//! - Deleting a resource file deletes everything it owns
//! - Bindings hydrate polymorphically from their tags
//! - Store images survive a save and reopen
//! - Configured tag reservations block registration
//! - Oversized reservations and wild addresses fail without panicking

use nodedb::model::{
    AnnotationValuePair, BindingRecord, CodeIndex, Constant, FileBinding, FileFingerprint, Method,
    MixedValue, ResourceFile, RuntimeConstant, Variable, WorkspaceLocation, FLG_COMPILER_DEFINED,
};
use nodedb::store::{Address, MemoryStore, Store};
use nodedb::{NodeDbConfig, NodeError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn allocated_blocks(index: &CodeIndex) -> usize {
    index
        .db()
        .store()
        .as_any()
        .downcast_ref::<MemoryStore>()
        .unwrap()
        .allocated_blocks()
}

/// A file with one method, one variable and one workspace location, with
/// annotation values, parameters and constants hanging off them.
fn populate(index: &mut CodeIndex) -> ResourceFile {
    let file = ResourceFile::create(index, "src/Main.java").unwrap();
    file.set_fingerprint(index, &FileFingerprint::new(1_700_000_000_000, 512, 0xfeed))
        .unwrap();
    WorkspaceLocation::create(index, &file, "/workspace/src/Main.java").unwrap();

    let method = Method::create(index, &file, "main").unwrap();
    method.set_modifiers(index, 0x9).unwrap();
    method.allocate_parameters(index, 2).unwrap();
    let args = method.create_new_parameter(index).unwrap();
    args.set_name(index, "args").unwrap();
    args.set_type_descriptor(index, "[Ljava/lang/String;").unwrap();
    let this = method.create_new_parameter(index).unwrap();
    this.set_flags(index, FLG_COMPILER_DEFINED).unwrap();

    let pair = AnnotationValuePair::create(index, &method, "value").unwrap();
    let array = Constant::create_from_mixed(
        index,
        &MixedValue::Array(vec![
            MixedValue::Constant(RuntimeConstant::String("unchecked".into())),
            MixedValue::Constant(RuntimeConstant::String("rawtypes".into())),
        ]),
    )
    .unwrap();
    pair.set_value(index, array).unwrap();
    let default = Constant::create(index, &RuntimeConstant::Int(0)).unwrap();
    method.set_default_value(index, default).unwrap();

    let variable = Variable::create(index, &file, "VERSION").unwrap();
    let value = Constant::create(index, &RuntimeConstant::Long(3)).unwrap();
    variable.set_constant(index, value).unwrap();

    file
}

// =============================================================================
// Cascade Deletion Tests
// =============================================================================

/// Every block allocated for a file is released when the file is deleted.
#[test]
fn test_delete_file_releases_everything() {
    let mut index = CodeIndex::in_memory().unwrap();
    let before = allocated_blocks(&index);

    let file = populate(&mut index);
    assert!(allocated_blocks(&index) > before);

    file.delete(&mut index).unwrap();
    assert_eq!(allocated_blocks(&index), before);
}

/// Deleting one binding leaves its siblings and the file intact.
#[test]
fn test_delete_binding_keeps_siblings() {
    let mut index = CodeIndex::in_memory().unwrap();
    let file = ResourceFile::create(&mut index, "A.java").unwrap();
    let first = Method::create(&mut index, &file, "a").unwrap();
    let second = Method::create(&mut index, &file, "b").unwrap();
    let third = Variable::create(&mut index, &file, "c").unwrap();

    first.delete(&mut index).unwrap();

    let bindings = file.bindings(&index).unwrap();
    assert_eq!(bindings.len(), 2);
    assert!(bindings.contains(&FileBinding::Method(second)));
    assert!(bindings.contains(&FileBinding::Variable(third)));
    assert_eq!(second.file(&index).unwrap(), Some(file));
}

/// Clearing a binding's owner deletes the binding.
#[test]
fn test_orphaned_binding_is_deleted() {
    let mut index = CodeIndex::in_memory().unwrap();
    let file = ResourceFile::create(&mut index, "A.java").unwrap();
    let before = allocated_blocks(&index);

    let variable = Variable::create(&mut index, &file, "x").unwrap();
    let value = Constant::create(&mut index, &RuntimeConstant::Boolean(true)).unwrap();
    variable.set_constant(&mut index, value).unwrap();
    variable.set_file(&mut index, None).unwrap();

    assert!(file.bindings(&index).unwrap().is_empty());
    assert_eq!(allocated_blocks(&index), before);
}

/// Moving a binding between files updates both backpointer lists.
#[test]
fn test_move_binding_between_files() {
    let mut index = CodeIndex::in_memory().unwrap();
    let a = ResourceFile::create(&mut index, "A.java").unwrap();
    let b = ResourceFile::create(&mut index, "B.java").unwrap();
    let method = Method::create(&mut index, &a, "m").unwrap();

    method.set_file(&mut index, Some(&b)).unwrap();
    assert!(a.bindings(&index).unwrap().is_empty());
    assert_eq!(
        b.bindings(&index).unwrap(),
        vec![FileBinding::Method(method)]
    );

    a.delete(&mut index).unwrap();
    assert_eq!(method.name(&index).unwrap(), "m");
}

// =============================================================================
// Hydration Tests
// =============================================================================

#[test]
fn test_records_read_back() {
    let mut index = CodeIndex::in_memory().unwrap();
    let file = populate(&mut index);

    assert_eq!(file.filename(&index).unwrap(), "src/Main.java");
    assert_eq!(file.fingerprint(&index).unwrap().hash(), 0xfeed);
    assert!(file.time_last_used(&index).unwrap() > 0);

    let locations = file.workspace_locations(&index).unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].path(&index).unwrap(), "/workspace/src/Main.java");
    assert_eq!(locations[0].resource(&index).unwrap(), Some(file));

    let bindings = file.bindings(&index).unwrap();
    let FileBinding::Method(method) = bindings[0] else {
        panic!("expected a method first, got {:?}", bindings[0]);
    };
    assert_eq!(method.modifiers(&index).unwrap(), 0x9);

    let parameters = method.parameters(&index).unwrap();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].name(&index).unwrap(), "args");
    assert!(!parameters[0].is_compiler_defined(&index).unwrap());
    assert!(parameters[1].is_compiler_defined(&index).unwrap());

    let pairs = method.annotation_values(&index).unwrap();
    assert_eq!(pairs.len(), 1);
    let owner = pairs[0].owner(&index).unwrap().unwrap();
    assert_eq!(owner.downcast_ref::<Method>(), Some(&method));
    let value = pairs[0].value(&index).unwrap().unwrap();
    assert_eq!(value.describe(&index), "[\"unchecked\", \"rawtypes\"]");

    let FileBinding::Variable(variable) = bindings[1] else {
        panic!("expected a variable second, got {:?}", bindings[1]);
    };
    let constant = variable.constant(&index).unwrap().unwrap();
    assert_eq!(
        constant.get_constant(&index).unwrap(),
        RuntimeConstant::Long(3)
    );
}

/// Typed handles refuse records of another kind.
#[test]
fn test_wrong_kind_is_rejected() {
    let mut index = CodeIndex::in_memory().unwrap();
    let file = ResourceFile::create(&mut index, "A.java").unwrap();
    let err = Method::from_address(&index, file.address()).unwrap_err();
    assert!(matches!(err, NodeError::KindMismatch { .. }));
    assert!(!err.is_corruption());
}

/// Detaching a workspace location deletes it.
#[test]
fn test_detach_location() {
    let mut index = CodeIndex::in_memory().unwrap();
    let file = ResourceFile::create(&mut index, "A.java").unwrap();
    let before = allocated_blocks(&index);
    let location = WorkspaceLocation::create(&mut index, &file, "/a").unwrap();
    location.detach(&mut index).unwrap();
    assert!(file.workspace_locations(&index).unwrap().is_empty());
    assert_eq!(allocated_blocks(&index), before);
}

/// A parameter reservation too large for the store fails cleanly and
/// leaves the method usable.
#[test]
fn test_oversized_parameter_reservation() {
    let mut index = CodeIndex::in_memory().unwrap();
    let file = ResourceFile::create(&mut index, "Big.java").unwrap();
    let method = Method::create(&mut index, &file, "run").unwrap();
    let before = allocated_blocks(&index);

    for count in [u32::MAX, u32::MAX / 4] {
        let err = method.allocate_parameters(&mut index, count).unwrap_err();
        assert!(matches!(err, NodeError::Store(_)));
    }
    assert_eq!(allocated_blocks(&index), before);

    let parameter = method.create_new_parameter(&mut index).unwrap();
    parameter.set_name(&mut index, "value").unwrap();
    assert_eq!(method.parameters(&index).unwrap().len(), 1);
}

/// Rendering an address far outside the store falls back to a placeholder.
#[test]
fn test_describe_wild_address() {
    let index = CodeIndex::in_memory().unwrap();
    let wild = Address::new(u64::MAX - 1);
    assert_eq!(index.describe(wild), format!("<record {}>", wild));
}

// =============================================================================
// Persistence Tests
// =============================================================================

/// An index saved to an image reopens with the same records.
#[test]
fn test_image_round_trip() {
    let tmp = TempDir::new().unwrap();
    let config = NodeDbConfig {
        image_path: Some(tmp.path().join("index.ndb")),
        ..NodeDbConfig::default()
    };

    let address = {
        let mut index = CodeIndex::from_config(&config).unwrap();
        let file = populate(&mut index);
        index.save(config.image_path.as_deref().unwrap()).unwrap();
        file.address()
    };

    let index = CodeIndex::from_config(&config).unwrap();
    let file = ResourceFile::from_address(&index, address).unwrap();
    assert_eq!(file.filename(&index).unwrap(), "src/Main.java");
    assert_eq!(file.bindings(&index).unwrap().len(), 2);
    assert!(index.describe(address).starts_with("ResourceFile@"));
}

/// A damaged image fails to open and reports corruption.
#[test]
fn test_damaged_image_is_corruption() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("index.ndb");
    let config = NodeDbConfig {
        image_path: Some(path.clone()),
        ..NodeDbConfig::default()
    };
    {
        let mut index = CodeIndex::from_config(&config).unwrap();
        populate(&mut index);
        index.save(&path).unwrap();
    }

    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let err = CodeIndex::from_config(&config).unwrap_err();
    assert!(err.is_corruption());
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_reserved_tag_collision_fails_open() {
    let config = NodeDbConfig {
        reserved_tags: vec![3],
        ..NodeDbConfig::default()
    };
    let err = CodeIndex::open(Box::new(MemoryStore::new()), &config).unwrap_err();
    assert!(matches!(err, NodeError::Schema(_)));
}

#[test]
fn test_schema_dump() {
    let config = NodeDbConfig {
        reserved_tags: vec![0x200],
        ..NodeDbConfig::default()
    };
    let index = CodeIndex::open(Box::new(MemoryStore::new()), &config).unwrap();
    let dump = index.dump_schema();
    assert_eq!(dump.reserved_tags, vec![6, 7, 0x200]);
    let tags: Vec<u16> = dump.kinds.iter().map(|k| k.tag).collect();
    let mut sorted = tags.clone();
    sorted.sort_unstable();
    assert_eq!(tags, sorted);
    assert!(dump.fragments.iter().any(|f| f.name == "Constant" && f.is_abstract));
}
