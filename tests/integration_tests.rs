// Gateway file to expose integration tests from the integration/ subdirectory
// Each test file in integration/ needs to be included here

mod common;

#[path = "integration/test_end_to_end.rs"]
mod test_end_to_end;

#[path = "integration/test_container_files.rs"]
mod test_container_files;

#[path = "integration/test_index_persistence.rs"]
mod test_index_persistence;

#[path = "integration/test_settings.rs"]
mod test_settings;
