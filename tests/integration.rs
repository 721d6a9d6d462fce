//! Integration tests against the in-memory backend.

use regkit::{
    KeyPath, MemoryBackend, OpenOptions, Registry, RegistryError, Subtree, Value, ValueType,
};
use std::sync::Arc;

fn registry_with_backend() -> (Registry, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    (Registry::new(backend.clone()), backend)
}

#[test]
fn test_values_round_trip() {
    let registry = Registry::in_memory();
    let app = registry.key("HKCU\\Software\\App").unwrap().create().unwrap();

    app.set("name", "regkit").unwrap();
    app.set("", "default").unwrap();

    let items: Vec<(String, Value)> = app.items().unwrap().map(|item| item.unwrap()).collect();
    assert_eq!(
        items,
        vec![
            ("name".to_string(), Value::from("regkit")),
            (String::new(), Value::from("default")),
        ]
    );

    app.delete_value("name").unwrap();
    let err = app.get("name").unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {:?}", err);
}

#[test]
fn test_typed_values() {
    let registry = Registry::in_memory();
    let key = registry.current_user().create_subkey("Typed").unwrap();

    key.set("dword", 42u32).unwrap();
    key.set("list", vec!["a", "b"]).unwrap();
    key.set("blob", vec![0xDEu8, 0xAD]).unwrap();
    key.set_typed("big", u64::MAX, ValueType::Qword).unwrap();
    key.set_typed("env", "%PATH%", ValueType::ExpandString).unwrap();

    assert_eq!(key.get_typed("dword").unwrap(), (Value::Int(42), ValueType::Dword));
    assert_eq!(
        key.get_typed("list").unwrap(),
        (Value::from(vec!["a", "b"]), ValueType::MultiString)
    );
    assert_eq!(key.get_typed("blob").unwrap().1, ValueType::Binary);
    assert_eq!(key.get("big").unwrap(), Value::Int(u64::MAX));
    assert_eq!(key.get_typed("env").unwrap().1, ValueType::ExpandString);

    let names: Vec<String> = key.keys().unwrap().collect();
    assert_eq!(names, vec!["big", "blob", "dword", "env", "list"]);
}

#[test]
fn test_unsupported_values_rejected() {
    let registry = Registry::in_memory();
    let key = registry.current_user().create_subkey("Bad").unwrap();

    assert!(matches!(
        key.set("wide", u64::from(u32::MAX) + 1),
        Err(RegistryError::UnsupportedType(_))
    ));
    assert!(matches!(
        key.set_typed("text", "x", ValueType::Dword),
        Err(RegistryError::UnsupportedType(_))
    ));
    assert!(matches!(
        key.set("list", vec!["a", ""]),
        Err(RegistryError::InvalidData(_))
    ));
    assert_eq!(key.value_names().unwrap().len(), 0);
}

#[test]
fn test_names_case_insensitive() {
    let registry = Registry::in_memory();
    let key = registry.current_user().create_subkey("Software\\Vendor").unwrap();
    key.set("Version", "1.0").unwrap();

    let again = registry.key("hkey_current_user/SOFTWARE/vendor").unwrap().open().unwrap();
    assert_eq!(again.get("VERSION").unwrap(), Value::from("1.0"));
    assert_eq!(again.value_names().unwrap(), vec!["Version"]);
    assert_eq!(
        registry.current_user().open().unwrap().subkey_names().unwrap(),
        vec!["Software"]
    );
}

#[test]
fn test_open_create_and_exists() {
    let registry = Registry::in_memory();
    let key = registry.current_user().subkey("Software\\Fresh");

    assert!(key.open().unwrap_err().is_not_found());
    assert!(!key.exists().unwrap());

    let opened = key.open_with(OpenOptions::new().create(true)).unwrap();
    assert!(opened.is_open());
    assert!(key.exists().unwrap());
    assert!(registry.current_user().subkey("Software").exists().unwrap());

    // Creating an existing key is a plain open.
    let reopened = key.create().unwrap();
    assert_eq!(reopened, opened);
}

#[test]
fn test_read_only_handle_cannot_write() {
    let registry = Registry::in_memory();
    registry.current_user().create_subkey("ReadOnly").unwrap();

    let key = registry.current_user().subkey("ReadOnly").open().unwrap();
    assert!(key.set("x", 1u32).unwrap_err().is_access_denied());

    let writable = registry
        .current_user()
        .open_subkey("ReadOnly", OpenOptions::new().write(true))
        .unwrap();
    writable.set("x", 1u32).unwrap();
}

#[test]
fn test_delete_non_recursive_refuses_children() {
    let registry = Registry::in_memory();
    let root = registry.current_user();
    root.create_subkey("Tree\\Child\\Leaf").unwrap();

    let tree = root.subkey("Tree");
    assert!(matches!(tree.delete(false), Err(RegistryError::NotEmpty(_))));
    assert!(root.subkey("Tree\\Child\\Leaf").exists().unwrap());

    root.subkey("Tree\\Child\\Leaf").delete(false).unwrap();
    assert!(!root.subkey("Tree\\Child\\Leaf").exists().unwrap());
    assert!(root.subkey("Tree\\Child").exists().unwrap());
}

#[test]
fn test_delete_recursive() {
    let registry = Registry::in_memory();
    let root = registry.current_user();
    root.create_subkey("Tree\\A\\A1").unwrap();
    root.create_subkey("Tree\\B").unwrap().set("v", 1u32).unwrap();

    root.subkey("Tree").delete(true).unwrap();
    assert!(!root.subkey("Tree").exists().unwrap());
    assert!(root.subkey("Tree").delete(true).unwrap_err().is_not_found());
}

#[test]
fn test_delete_root_denied() {
    let registry = Registry::in_memory();
    assert!(registry.local_machine().delete(false).unwrap_err().is_access_denied());
}

#[test]
fn test_stale_handle_after_delete() {
    let registry = Registry::in_memory();
    let opened = registry.current_user().create_subkey("Doomed").unwrap();
    registry.current_user().subkey("Doomed").delete(false).unwrap();

    assert!(matches!(
        opened.get("x"),
        Err(RegistryError::Os { code: 1018, .. })
    ));
}

#[test]
fn test_handles_released() {
    let (registry, backend) = registry_with_backend();
    {
        let key = registry.current_user().create_subkey("Scoped").unwrap();
        key.set("a", "b").unwrap();
        assert_eq!(backend.open_handle_count(), 1);
    }
    assert_eq!(backend.open_handle_count(), 0);

    // Release also happens when the body fails.
    let failing = || -> regkit::Result<()> {
        let key = registry.current_user().subkey("Scoped").open()?;
        key.get("missing")?;
        Ok(())
    };
    assert!(failing().unwrap_err().is_not_found());
    assert_eq!(backend.open_handle_count(), 0);

    let mut key = registry.current_user().subkey("Scoped").open().unwrap();
    key.close();
    assert_eq!(backend.open_handle_count(), 0);
}

#[test]
fn test_traversal_releases_handles() {
    let (registry, backend) = registry_with_backend();
    registry.current_user().create_subkey("W\\X\\Y").unwrap();

    let count = registry.current_user().subkey("W").walk().count();
    assert_eq!(count, 3);
    registry.current_user().subkey("W").as_dict().unwrap();
    assert_eq!(backend.open_handle_count(), 0);
}

#[test]
fn test_exists_propagates_access_denied() {
    let (registry, backend) = registry_with_backend();
    registry.local_machine().create_subkey("Secret\\Inner").unwrap();
    backend.deny(&KeyPath::parse("HKLM\\Secret").unwrap());

    let err = registry.local_machine().subkey("Secret\\Inner").exists().unwrap_err();
    assert!(err.is_access_denied());
    assert!(!registry.local_machine().subkey("Elsewhere").exists().unwrap());

    backend.allow_all();
    assert!(registry.local_machine().subkey("Secret\\Inner").exists().unwrap());
}

#[test]
fn test_walk_bottom_up_descendants_first() {
    let registry = Registry::in_memory();
    let root = registry.current_user();
    for path in ["Deep\\L1a\\L2a", "Deep\\L1a\\L2b", "Deep\\L1b\\L2c\\L3"] {
        root.create_subkey(path).unwrap();
    }

    let order: Vec<String> = root
        .subkey("Deep")
        .walk()
        .top_down(false)
        .map(|entry| entry.unwrap().key.path().subpath())
        .collect();

    for (index, path) in order.iter().enumerate() {
        for later in &order[index + 1..] {
            assert!(
                !later.starts_with(&format!("{}\\", path)),
                "{} emitted after its ancestor {}",
                later,
                path
            );
        }
    }
    assert_eq!(order.last().map(String::as_str), Some("Deep"));
    assert_eq!(order.len(), 7);
}

#[test]
fn test_from_dict_merges() {
    let registry = Registry::in_memory();
    let root = registry.current_user();
    root.create_subkey("Dst").unwrap().set("keep", "sibling").unwrap();

    let data = Subtree::new()
        .with_value("x", 1u32)
        .unwrap()
        .with_subkey("Child", Subtree::new().with_value("y", "z").unwrap());

    let dst = root.subkey("Dst");
    dst.from_dict(&data).unwrap();

    let exported = dst.as_dict().unwrap();
    assert_eq!(exported.values["x"].value, Value::Int(1));
    assert_eq!(exported.values["x"].value_type, ValueType::Dword);
    assert_eq!(exported.values["keep"].value, Value::from("sibling"));
    assert_eq!(exported.subkeys["Child"], data.subkeys["Child"]);
}

#[test]
fn test_replace_from_dict_matches_data() {
    let registry = Registry::in_memory();
    let root = registry.current_user();
    root.create_subkey("Mirror\\Old").unwrap();
    root.create_subkey("Mirror").unwrap().set("stale", "x").unwrap();

    let data = Subtree::new().with_subkey("New", Subtree::new().with_value("", "d").unwrap());
    let mirror = root.subkey("Mirror");
    mirror.replace_from_dict(&data).unwrap();

    assert_eq!(mirror.as_dict().unwrap(), data);
}

#[test]
fn test_key_info() {
    let registry = Registry::in_memory();
    let key = registry.current_user().create_subkey("Info").unwrap();
    key.set("a", 1u32).unwrap();
    key.set("b", 2u32).unwrap();
    registry.current_user().create_subkey("Info\\Sub").unwrap();

    let info = key.info().unwrap();
    assert_eq!(info.subkey_count, 1);
    assert_eq!(info.value_count, 2);
    assert!(info.last_written <= chrono::Utc::now());
}

#[test]
fn test_write_tree_flat() {
    let registry = Registry::in_memory();
    let root = registry.current_user();
    root.create_subkey("Print\\Nested\\Deeper").unwrap();
    root.create_subkey("Print").unwrap().set("n", 3u32).unwrap();

    let mut out = Vec::new();
    root.subkey("Print").write_tree(&mut out, false).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "key: 'Print'\n    val: 'n' = 3 (0x3)\n    key: 'Nested'\n"
    );
}

#[cfg(feature = "serde")]
#[test]
fn test_subtree_json() {
    let registry = Registry::in_memory();
    let key = registry.current_user().create_subkey("Json").unwrap();
    key.set("port", 8080u32).unwrap();
    key.set("hosts", vec!["a", "b"]).unwrap();

    let data = registry.current_user().subkey("Json").as_dict().unwrap();
    let json = data.to_json().unwrap();
    assert!(json.contains("\"__values__\""));
    assert!(json.contains("\"REG_DWORD\""));

    let parsed = Subtree::from_json(&json).unwrap();
    assert_eq!(parsed, data);
}
