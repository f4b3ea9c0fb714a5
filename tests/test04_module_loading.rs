use std::io::Write;

use sql_drivers::config::keys;
use sql_drivers::driver::module_filenames;
use sql_drivers::{ConnectionConfig, DriverRegistry, SqlDriverError};

#[test]
fn unresolvable_driver_is_driver_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DriverRegistry::new();
    registry.use_default_search_path(false);
    registry.add_search_path(dir.path());

    let config = ConnectionConfig::new("no_such_backend");
    let err = registry.find_driver(&config, None).unwrap_err();
    assert!(matches!(err, SqlDriverError::DriverNotFound(_)));
}

#[test]
fn junk_module_file_never_opens() {
    let dir = tempfile::tempdir().unwrap();
    let module = dir.path().join("not_a_module.so");
    let mut file = std::fs::File::create(&module).unwrap();
    file.write_all(b"this is not a shared object").unwrap();

    let registry = DriverRegistry::new();
    registry.use_default_search_path(false);

    // @module makes the junk file the only candidate
    let config = ConnectionConfig::new("mock").with(keys::MODULE, module.to_str().unwrap());
    let err = registry.find_driver(&config, None).unwrap_err();
    assert!(matches!(err, SqlDriverError::DriverNotFound(_)));
}

#[test]
fn conventional_filename_lookup_covers_configured_paths() {
    let dir = tempfile::tempdir().unwrap();
    // drop the conventional filenames in place as junk; they must be found
    // (and rejected as unopenable) rather than skipped
    for filename in module_filenames("probe") {
        std::fs::write(dir.path().join(filename), b"junk").unwrap();
    }

    let registry = DriverRegistry::new();
    registry.use_default_search_path(false);
    registry.add_search_path(dir.path());

    let err = registry
        .find_driver(&ConnectionConfig::new("probe"), None)
        .unwrap_err();
    // candidates existed but none was loadable
    assert!(matches!(err, SqlDriverError::DriverNotFound(_)));
}

#[test]
fn no_search_locations_means_no_candidates() {
    let registry = DriverRegistry::new();
    registry.add_search_path("/nonexistent");
    registry.clear_search_paths();
    registry.use_default_search_path(false);

    let err = registry
        .find_driver(&ConnectionConfig::new("orphan"), None)
        .unwrap_err();
    assert!(matches!(err, SqlDriverError::DriverNotFound(_)));
}
