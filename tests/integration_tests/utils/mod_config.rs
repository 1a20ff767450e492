use odmlite::collection::{Acknowledgment, WriteConcern};
use odmlite::{DatastoreOptions, OdmError};
use std::io::Write;

#[test]
fn options_load_from_a_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
validate_queries = false
class_name_key = "_t"
multi_update_by_default = false
default_max_time_ms = 500

[default_write_concern]
w = "majority"
journal = true
"#
    )
    .unwrap();

    let options = DatastoreOptions::from_file(file.path()).unwrap();
    assert!(!options.validate_queries);
    assert!(options.validate_updates);
    assert_eq!(options.class_name_key, "_t");
    assert!(!options.multi_update_by_default);
    assert_eq!(options.default_max_time_ms, Some(500));
    assert_eq!(options.default_write_concern.w, Some(Acknowledgment::Custom("majority".into())));
    assert_eq!(options.default_write_concern.journal, Some(true));
}

#[test]
fn explicit_path_wins_in_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odmlite.toml");
    std::fs::write(&path, "store_class_name = false\n").unwrap();
    let options = DatastoreOptions::load(Some(&path)).unwrap();
    assert!(!options.store_class_name);
}

#[test]
fn bad_files_are_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "validate_queries = \"sometimes\"\n").unwrap();
    assert!(matches!(DatastoreOptions::from_file(&path), Err(OdmError::Config(_))));

    std::fs::write(&path, "class_name_key = \"a.b\"\n").unwrap();
    assert!(matches!(DatastoreOptions::from_file(&path), Err(OdmError::Config(_))));

    assert!(matches!(DatastoreOptions::from_file(&dir.path().join("absent.toml")), Err(OdmError::Io(_))));
}

#[test]
fn defaults_match_documented_values() {
    let options = DatastoreOptions::default();
    assert!(options.validate_queries && options.validate_updates);
    assert!(options.store_class_name && options.multi_update_by_default);
    assert_eq!(options.class_name_key, "className");
    assert_eq!(options.default_write_concern, WriteConcern::default());
}

#[test]
fn custom_class_name_key_is_used_for_storage() {
    let options = DatastoreOptions { class_name_key: "_t".into(), ..DatastoreOptions::default() };
    let ds = odmlite::Datastore::in_memory_with(options);
    ds.save(&mut crate::integration_tests::_support::Circle::new(1.0)).unwrap();
    let raw = ds
        .storage()
        .collection("circles")
        .find(&bson::doc! {}, &odmlite::collection::FindOptions::default())
        .unwrap()
        .to_vec();
    assert_eq!(raw[0].get_str("_t").unwrap(), "Circle");
}
